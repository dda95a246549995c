//! Solidity compilation through the `solc --standard-json` interface.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Stdio,
};

use alloy_core::json_abi::JsonAbi;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::{io::AsyncWriteExt, process::Command};

use crate::{
    artifacts::{ARTIFACT_FORMAT, Artifact, ArtifactStore, BUILD_INFO_DIR, LinkReferences},
    config::{SolidityConfig, StreamerConfig},
};

/// Name of the compilation cache file.
pub const CACHE_FILENAME: &str = "solidity-files-cache.json";

const CACHE_FORMAT: &str = "streamer-solidity-cache-1";
const BUILD_INFO_FORMAT: &str = "hh-sol-build-info-1";

/// Standard JSON outputs requested for every contract.
const OUTPUT_SELECTION: &[&str] = &[
    "abi",
    "evm.bytecode",
    "evm.deployedBytecode",
    "evm.methodIdentifiers",
    "metadata",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContent {
    pub content: String,
}

/// `solc --standard-json` input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolcInput {
    pub language: &'static str,
    pub sources: BTreeMap<String, SourceContent>,
    pub settings: Value,
}

impl SolcInput {
    /// Build the compiler input for a set of sources, keyed by source name.
    pub fn new(sources: BTreeMap<String, SourceContent>, solidity: &SolidityConfig) -> Self {
        let optimizer = &solidity.settings.optimizer;
        Self {
            language: "Solidity",
            sources,
            settings: serde_json::json!({
                "optimizer": {
                    "enabled": optimizer.enabled,
                    "runs": optimizer.runs,
                },
                "outputSelection": {
                    "*": {
                        "*": OUTPUT_SELECTION,
                        "": ["ast"],
                    }
                }
            }),
        }
    }

    /// SHA-256 of the serialized input, hex encoded.
    pub fn hash(&self) -> Result<String> {
        let json = serde_json::to_string(self).context("Failed to serialize solc input")?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// A diagnostic reported by solc.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolcDiagnostic {
    pub severity: String,
    pub message: String,
    #[serde(default)]
    pub formatted_message: Option<String>,
}

impl SolcDiagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }

    fn display(&self) -> &str {
        self.formatted_message
            .as_deref()
            .unwrap_or(&self.message)
            .trim_end()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolcBytecode {
    #[serde(default)]
    object: String,
    #[serde(default)]
    link_references: LinkReferences,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolcEvm {
    bytecode: SolcBytecode,
    deployed_bytecode: SolcBytecode,
}

#[derive(Debug, Clone, Deserialize)]
struct SolcContract {
    abi: JsonAbi,
    evm: SolcEvm,
}

/// `solc --standard-json` output, restricted to what artifacts need.
#[derive(Debug, Clone, Deserialize)]
pub struct SolcOutput {
    #[serde(default)]
    pub errors: Vec<SolcDiagnostic>,
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, SolcContract>>,
}

impl SolcOutput {
    /// Fail with every error diagnostic, logging warnings along the way.
    pub fn check(&self) -> Result<()> {
        let mut errors = Vec::new();
        for diagnostic in &self.errors {
            if diagnostic.is_error() {
                errors.push(diagnostic.display().to_string());
            } else {
                tracing::warn!("{}", diagnostic.display());
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("Compilation failed:\n{}", errors.join("\n"));
        }
        Ok(())
    }

    /// Convert the compiled contracts to artifacts.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.contracts
            .iter()
            .flat_map(|(source_name, contracts)| {
                contracts.iter().map(move |(contract_name, contract)| Artifact {
                    format: ARTIFACT_FORMAT.to_string(),
                    contract_name: contract_name.clone(),
                    source_name: source_name.clone(),
                    abi: contract.abi.clone(),
                    bytecode: format!("0x{}", contract.evm.bytecode.object),
                    deployed_bytecode: format!("0x{}", contract.evm.deployed_bytecode.object),
                    link_references: contract.evm.bytecode.link_references.clone(),
                    deployed_link_references: contract.evm.deployed_bytecode.link_references.clone(),
                })
            })
            .collect()
    }
}

/// Extract the `major.minor.patch` part of `solc --version` output.
pub fn parse_solc_version(output: &str) -> Option<String> {
    let line = output
        .lines()
        .find_map(|l| l.trim().strip_prefix("Version:"))?;
    let version = line.trim().split(['+', '-']).next()?.trim();
    if version.is_empty() {
        return None;
    }
    Some(version.to_string())
}

/// Compilation cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompilationCache {
    #[serde(rename = "_format")]
    format: String,
    solc_version: String,
    input_hash: String,
    artifacts: Vec<String>,
}

/// Result of a compile run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Sources and settings unchanged since the last compilation.
    UpToDate,
    /// Artifacts were written for these fully qualified names.
    Compiled(Vec<String>),
}

/// Drives solc for a project.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    root: PathBuf,
    solidity: SolidityConfig,
    sources: PathBuf,
    cache: PathBuf,
    store: ArtifactStore,
}

impl SolcCompiler {
    /// Create a compiler for the project rooted at `root`. Relative configured paths are
    /// resolved against it.
    pub fn new(root: impl Into<PathBuf>, config: &StreamerConfig) -> Self {
        let root = root.into();
        Self {
            sources: root.join(&config.paths.sources),
            cache: root.join(&config.paths.cache),
            store: ArtifactStore::new(root.join(&config.paths.artifacts)),
            solidity: config.solidity.clone(),
            root,
        }
    }

    /// Read every `.sol` file below the sources directory, keyed by its path relative to
    /// the project root with `/` separators.
    pub fn collect_sources(&self) -> Result<BTreeMap<String, SourceContent>> {
        let mut files = Vec::new();
        if self.sources.is_dir() {
            collect_solidity_files(&self.sources, &mut files)?;
        }

        let mut sources = BTreeMap::new();
        for file in files {
            let name = file
                .strip_prefix(&self.root)
                .unwrap_or(&file)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read source {}", file.display()))?;
            sources.insert(name, SourceContent { content });
        }

        Ok(sources)
    }

    /// Version reported by the configured solc binary.
    pub async fn solc_version(&self) -> Result<String> {
        let output = Command::new(&self.solidity.solc)
            .arg("--version")
            .output()
            .await
            .with_context(|| {
                format!("Failed to run {} --version. Is solc installed?", self.solidity.solc.display())
            })?;

        if !output.status.success() {
            anyhow::bail!(
                "{} --version exited with {}",
                self.solidity.solc.display(),
                output.status
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_solc_version(&stdout).with_context(|| {
            format!("Could not read the solc version from output: {}", stdout.trim())
        })
    }

    fn cache_path(&self) -> PathBuf {
        self.cache.join(CACHE_FILENAME)
    }

    fn load_cache(&self) -> Option<CompilationCache> {
        let content = std::fs::read_to_string(self.cache_path()).ok()?;
        let cache: CompilationCache = serde_json::from_str(&content).ok()?;
        (cache.format == CACHE_FORMAT).then_some(cache)
    }

    fn is_up_to_date(&self, cache: &CompilationCache, input_hash: &str) -> bool {
        cache.solc_version == self.solidity.version
            && cache.input_hash == input_hash
            && cache.artifacts.iter().all(|fqn| {
                crate::artifacts::parse_fully_qualified_name(fqn)
                    .is_some_and(|(source, contract)| self.store.artifact_path(source, contract).exists())
            })
    }

    /// Compile the project, skipping the run when nothing changed unless `force` is set.
    pub async fn compile(&self, force: bool) -> Result<CompileOutcome> {
        let sources = self.collect_sources()?;
        if sources.is_empty() {
            tracing::warn!(sources = %self.sources.display(), "No Solidity source files found");
            self.clear_previous_output()?;
            return Ok(CompileOutcome::UpToDate);
        }

        let input = SolcInput::new(sources, &self.solidity);
        let input_hash = input.hash()?;
        let previous = self.load_cache();

        if !force && previous.as_ref().is_some_and(|c| self.is_up_to_date(c, &input_hash)) {
            tracing::info!("Nothing to compile");
            return Ok(CompileOutcome::UpToDate);
        }

        let version = self.solc_version().await?;
        if version != self.solidity.version {
            anyhow::bail!(
                "solc version mismatch: configured {}, but {} reports {}",
                self.solidity.version,
                self.solidity.solc.display(),
                version
            );
        }

        tracing::info!(
            files = input.sources.len(),
            solc = %version,
            optimizer = self.solidity.settings.optimizer.enabled,
            runs = self.solidity.settings.optimizer.runs,
            "Compiling Solidity sources..."
        );

        let raw_output = self.run_solc(&input).await?;
        let output: SolcOutput =
            serde_json::from_value(raw_output.clone()).context("Failed to parse solc output")?;
        output.check()?;

        let mut written = Vec::new();
        for artifact in output.artifacts() {
            let path = self.store.save_artifact(&artifact)?;
            tracing::debug!(contract = %artifact.fully_qualified_name(), path = %path.display(), "Artifact written");
            written.push(artifact.fully_qualified_name());
        }

        if let Some(previous) = &previous {
            for stale in previous.artifacts.iter().filter(|fqn| !written.contains(*fqn)) {
                tracing::debug!(contract = %stale, "Removing obsolete artifact");
                self.store.remove_artifact(stale)?;
            }
        }

        self.write_build_info(&input_hash, &version, &input, &raw_output)?;
        self.write_cache(&CompilationCache {
            format: CACHE_FORMAT.to_string(),
            solc_version: version,
            input_hash,
            artifacts: written.clone(),
        })?;

        tracing::info!(artifacts = written.len(), "Compiled Solidity sources successfully");

        Ok(CompileOutcome::Compiled(written))
    }

    async fn run_solc(&self, input: &SolcInput) -> Result<Value> {
        let input_json = serde_json::to_vec(input).context("Failed to serialize solc input")?;

        let mut child = Command::new(&self.solidity.solc)
            .arg("--standard-json")
            .arg("--base-path")
            .arg(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.solidity.solc.display()))?;

        let mut stdin = child.stdin.take().context("Failed to open solc stdin")?;
        stdin
            .write_all(&input_json)
            .await
            .context("Failed to write solc input")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for solc")?;

        if !output.status.success() {
            anyhow::bail!(
                "solc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        serde_json::from_slice(&output.stdout).context("solc produced invalid JSON")
    }

    fn write_build_info(
        &self,
        id: &str,
        version: &str,
        input: &SolcInput,
        output: &Value,
    ) -> Result<()> {
        let dir = self.store.root().join(BUILD_INFO_DIR);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let build_info = serde_json::json!({
            "_format": BUILD_INFO_FORMAT,
            "id": id,
            "solcVersion": version,
            "input": input,
            "output": output,
        });

        let path = dir.join(format!("{}.json", id));
        std::fs::write(&path, serde_json::to_vec(&build_info)?)
            .with_context(|| format!("Failed to write build info {}", path.display()))?;
        Ok(())
    }

    /// Remove the artifacts and cache of the last compilation.
    fn clear_previous_output(&self) -> Result<()> {
        let Some(previous) = self.load_cache() else {
            return Ok(());
        };

        for stale in &previous.artifacts {
            tracing::debug!(contract = %stale, "Removing obsolete artifact");
            self.store.remove_artifact(stale)?;
        }

        let path = self.cache_path();
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))
    }

    fn write_cache(&self, cache: &CompilationCache) -> Result<()> {
        std::fs::create_dir_all(&self.cache)
            .with_context(|| format!("Failed to create {}", self.cache.display()))?;
        let json = serde_json::to_string_pretty(cache).context("Failed to serialize cache")?;
        std::fs::write(self.cache_path(), json)
            .with_context(|| format!("Failed to write {}", self.cache_path().display()))?;
        Ok(())
    }
}

fn collect_solidity_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read sources directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_solidity_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "sol") {
            files.push(path);
        }
    }

    files.sort();
    Ok(())
}
