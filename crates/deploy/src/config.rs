//! Project configuration.
//!
//! The configuration is layered: built-in defaults, then the `Streamer.toml` file of the
//! project (if any), then environment variables prefixed with `STREAMER_` where `__`
//! separates nested keys (e.g. `STREAMER_NETWORKS__LOCALHOST__URL`).

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

/// The default name of the project configuration file.
pub const CONFIG_FILENAME: &str = "Streamer.toml";

/// Prefix of the environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "STREAMER_";

/// Default solc version.
pub const DEFAULT_SOLC_VERSION: &str = "0.8.30";
/// Default number of optimizer runs.
pub const DEFAULT_OPTIMIZER_RUNS: u32 = 1000;

/// Name of the built-in local development network.
pub const LOCALHOST_NETWORK: &str = "localhost";
/// RPC endpoint of the built-in local development network.
pub const LOCALHOST_URL: &str = "http://127.0.0.1:8545";
/// Chain ID of the built-in local development network.
pub const LOCALHOST_CHAIN_ID: u64 = 31337;

/// Default HTTP request timeout for a network, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 40_000;

/// Default derivation path prefix for mnemonic accounts.
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/";
/// Default number of accounts derived from a mnemonic.
pub const DEFAULT_MNEMONIC_COUNT: u32 = 20;

/// Optimizer settings passed to solc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Toggles bytecode optimization.
    pub enabled: bool,
    /// Expected number of calls over the contract lifetime.
    pub runs: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            runs: DEFAULT_OPTIMIZER_RUNS,
        }
    }
}

/// Compiler settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolcSettings {
    pub optimizer: OptimizerConfig,
}

/// Solidity compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolidityConfig {
    /// Exact compiler version, `major.minor.patch`.
    pub version: String,
    /// Compiler settings.
    #[serde(default)]
    pub settings: SolcSettings,
    /// Name or path of the solc binary.
    #[serde(default = "default_solc")]
    pub solc: PathBuf,
}

fn default_solc() -> PathBuf {
    PathBuf::from("solc")
}

impl Default for SolidityConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_SOLC_VERSION.to_string(),
            settings: SolcSettings::default(),
            solc: default_solc(),
        }
    }
}

/// HD wallet accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MnemonicConfig {
    /// BIP-39 phrase.
    pub phrase: String,
    /// Derivation path prefix, the account index is appended to it.
    #[serde(default = "default_derivation_path")]
    pub path: String,
    /// Index of the first derived account.
    #[serde(default)]
    pub initial_index: u32,
    /// Number of derived accounts.
    #[serde(default = "default_mnemonic_count")]
    pub count: u32,
}

fn default_derivation_path() -> String {
    DEFAULT_DERIVATION_PATH.to_string()
}

fn default_mnemonic_count() -> u32 {
    DEFAULT_MNEMONIC_COUNT
}

/// Where the signing accounts of a network come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountsConfig {
    /// Accounts managed by the node, listed with `eth_accounts`.
    #[default]
    Remote,
    /// Hex-encoded private keys.
    PrivateKeys(Vec<String>),
    /// Accounts derived from a mnemonic.
    Mnemonic(MnemonicConfig),
}

/// A named network entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    pub url: String,
    /// Chain ID used for signing and checked against the node.
    pub chain_id: u64,
    /// Signing accounts.
    #[serde(default)]
    pub accounts: AccountsConfig,
    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Fixed gas limit. Gas is estimated when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl NetworkConfig {
    /// The built-in local development network.
    pub fn localhost() -> Self {
        Self {
            url: LOCALHOST_URL.to_string(),
            chain_id: LOCALHOST_CHAIN_ID,
            accounts: AccountsConfig::Remote,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            gas: None,
        }
    }

    /// Parse the network URL.
    pub fn rpc_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url).with_context(|| format!("Invalid RPC URL '{}'", self.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Unsupported RPC URL scheme '{}': expected http or https", url.scheme());
        }
        Ok(url)
    }
}

/// Project layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the Solidity sources.
    pub sources: PathBuf,
    /// Directory receiving the compiled artifacts.
    pub artifacts: PathBuf,
    /// Directory holding the compilation cache.
    pub cache: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources: PathBuf::from("contracts"),
            artifacts: PathBuf::from("artifacts"),
            cache: PathBuf::from("cache"),
        }
    }
}

/// Settings for deployment tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Interval between two receipt lookups, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

/// The whole project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// Network used when none is selected on the command line.
    pub default_network: String,
    /// Solidity compiler configuration.
    pub solidity: SolidityConfig,
    /// Named networks.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Project layout.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Deployment settings.
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            default_network: LOCALHOST_NETWORK.to_string(),
            solidity: SolidityConfig::default(),
            networks: BTreeMap::from([(LOCALHOST_NETWORK.to_string(), NetworkConfig::localhost())]),
            paths: PathsConfig::default(),
            deploy: DeployConfig::default(),
        }
    }
}

impl StreamerConfig {
    /// Build the layered configuration figment for a project file.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    ///
    /// `path` may point to the file itself or to the project directory. A missing file is
    /// only tolerated when `required` is false, in which case defaults apply.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        if required && !config_path.exists() {
            anyhow::bail!("Configuration file not found: {}", config_path.display());
        }

        let config: Self = Self::figment(&config_path)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

        config.validate()?;

        tracing::debug!(
            path = %config_path.display(),
            solc = %config.solidity.version,
            networks = config.networks.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Look up a network by name.
    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).with_context(|| {
            format!(
                "Network '{}' is not defined. Known networks: {}",
                name,
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    /// Check the values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        validate_version(&self.solidity.version)?;

        for (name, network) in &self.networks {
            network
                .rpc_url()
                .with_context(|| format!("Invalid configuration for network '{}'", name))?;

            if network.chain_id == 0 {
                anyhow::bail!("Invalid configuration for network '{}': chain_id must be non-zero", name);
            }

            match &network.accounts {
                AccountsConfig::Remote => {}
                AccountsConfig::PrivateKeys(keys) => {
                    for (i, key) in keys.iter().enumerate() {
                        validate_private_key(key).with_context(|| {
                            format!("Invalid private key #{} for network '{}'", i, name)
                        })?;
                    }
                }
                AccountsConfig::Mnemonic(mnemonic) => {
                    if mnemonic.count == 0 {
                        anyhow::bail!(
                            "Invalid configuration for network '{}': mnemonic count must be non-zero",
                            name
                        );
                    }
                }
            }
        }

        self.network(&self.default_network)
            .context("Invalid default_network")?;

        Ok(())
    }
}

/// Validate an exact `major.minor.patch` compiler version.
fn validate_version(version: &str) -> Result<()> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        anyhow::bail!(
            "Invalid solidity version '{}': expected an exact version like {}",
            version,
            DEFAULT_SOLC_VERSION
        );
    }
    Ok(())
}

/// Validate a hex-encoded 32-byte private key without echoing it.
fn validate_private_key(key: &str) -> Result<()> {
    let raw = key.strip_prefix("0x").unwrap_or(key);
    let bytes = hex::decode(raw).context("private key is not valid hex")?;
    if bytes.len() != 32 {
        anyhow::bail!("private key must be 32 bytes, got {}", bytes.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    // Loading reads `STREAMER_*` variables, so every test touching the environment runs in a
    // jail to serialize access to it.

    #[test]
    fn test_defaults_match_project_settings() {
        let config = StreamerConfig::default();

        assert_eq!(config.solidity.version, "0.8.30");
        assert!(config.solidity.settings.optimizer.enabled);
        assert_eq!(config.solidity.settings.optimizer.runs, 1000);

        let localhost = config.network("localhost").unwrap();
        assert_eq!(localhost.url, "http://127.0.0.1:8545");
        assert_eq!(localhost.chain_id, 31337);
        assert_eq!(localhost.accounts, AccountsConfig::Remote);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_optional_file_uses_defaults() {
        Jail::expect_with(|jail| {
            let config = StreamerConfig::load(jail.directory(), false).unwrap();
            assert_eq!(config, StreamerConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_missing_required_file_fails() {
        Jail::expect_with(|jail| {
            let result = StreamerConfig::load(&jail.directory().join("nope.toml"), true);
            assert!(result.is_err());
            Ok(())
        });
    }

    #[test]
    fn test_load_file_merges_with_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
[solidity.settings.optimizer]
enabled = false
runs = 200

[networks.sepolia]
url = "https://rpc.sepolia.example"
chain_id = 11155111
accounts = { private_keys = ["0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"] }
"#,
            )?;
            let path = jail.directory().join(CONFIG_FILENAME);

            let config = StreamerConfig::load(&path, true).unwrap();

            assert_eq!(config.solidity.version, DEFAULT_SOLC_VERSION);
            assert!(!config.solidity.settings.optimizer.enabled);
            assert_eq!(config.solidity.settings.optimizer.runs, 200);
            assert!(config.networks.contains_key("localhost"));

            let sepolia = config.network("sepolia").unwrap();
            assert_eq!(sepolia.chain_id, 11155111);
            assert_eq!(sepolia.timeout_ms, DEFAULT_TIMEOUT_MS);
            assert!(
                matches!(&sepolia.accounts, AccountsConfig::PrivateKeys(keys) if keys.len() == 1)
            );
            Ok(())
        });
    }

    #[test]
    fn test_mnemonic_accounts_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
[networks.devnet]
url = "http://127.0.0.1:9545"
chain_id = 1337

[networks.devnet.accounts.mnemonic]
phrase = "test test test test test test test test test test test junk"
"#,
            )?;
            let path = jail.directory().join(CONFIG_FILENAME);

            let config = StreamerConfig::load(&path, true).unwrap();
            match &config.network("devnet").unwrap().accounts {
                AccountsConfig::Mnemonic(m) => {
                    assert_eq!(m.path, DEFAULT_DERIVATION_PATH);
                    assert_eq!(m.initial_index, 0);
                    assert_eq!(m.count, DEFAULT_MNEMONIC_COUNT);
                }
                other => panic!("unexpected accounts: {:?}", other),
            }
            Ok(())
        });
    }

    #[test]
    fn test_malformed_toml_fails_at_load() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILENAME, "[solidity\nversion = ")?;
            let path = jail.directory().join(CONFIG_FILENAME);
            assert!(StreamerConfig::load(&path, true).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = StreamerConfig::default();
        config.solidity.version = "^0.8.0".to_string();
        assert!(config.validate().is_err());

        let mut config = StreamerConfig::default();
        config.networks.get_mut("localhost").unwrap().chain_id = 0;
        assert!(config.validate().is_err());

        let mut config = StreamerConfig::default();
        config.networks.get_mut("localhost").unwrap().url = "ws://127.0.0.1:8546".to_string();
        assert!(config.validate().is_err());

        let mut config = StreamerConfig::default();
        config.networks.get_mut("localhost").unwrap().accounts =
            AccountsConfig::PrivateKeys(vec!["0x1234".to_string()]);
        assert!(config.validate().is_err());

        let mut config = StreamerConfig::default();
        config.default_network = "mainnet".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_network_lists_known_ones() {
        let config = StreamerConfig::default();
        let err = config.network("mainnet").unwrap_err().to_string();
        assert!(err.contains("mainnet"));
        assert!(err.contains("localhost"));
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
[networks.localhost]
url = "http://127.0.0.1:8545"
chain_id = 31337
"#,
            )?;
            let path = jail.directory().join(CONFIG_FILENAME);
            jail.set_env("STREAMER_NETWORKS__LOCALHOST__URL", "http://10.0.0.2:8545");
            jail.set_env("STREAMER_SOLIDITY__SETTINGS__OPTIMIZER__RUNS", "500");

            let config = StreamerConfig::load(&path, true).unwrap();
            assert_eq!(config.networks["localhost"].url, "http://10.0.0.2:8545");
            assert_eq!(config.solidity.settings.optimizer.runs, 500);
            Ok(())
        });
    }

    #[test]
    fn test_save_and_reload() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join(CONFIG_FILENAME);

            let config = StreamerConfig::default();
            config.save_to_file(&path).unwrap();

            let loaded = StreamerConfig::load(&path, true).unwrap();
            assert_eq!(loaded, config);
            Ok(())
        });
    }
}
