//! Compiled contract artifacts.
//!
//! Artifacts are stored one file per contract at
//! `<artifacts>/<sourceName>/<ContractName>.json`, which is the layout the hardhat tooling
//! uses, so artifacts produced by either tool can be deployed by the other.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::json_abi::JsonAbi;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Format tag of contract artifacts.
pub const ARTIFACT_FORMAT: &str = "hh-sol-artifact-1";

/// Directory (relative to the artifacts root) holding the compiler build info.
pub const BUILD_INFO_DIR: &str = "build-info";

/// Position of a library address placeholder in bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReference {
    pub start: usize,
    pub length: usize,
}

/// Library placeholders, keyed by source name then library name.
pub type LinkReferences = BTreeMap<String, BTreeMap<String, Vec<LinkReference>>>;

/// A compiled contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(rename = "_format")]
    pub format: String,
    pub contract_name: String,
    pub source_name: String,
    pub abi: JsonAbi,
    /// Creation bytecode, `0x`-prefixed. May contain library placeholders.
    pub bytecode: String,
    /// Runtime bytecode, `0x`-prefixed.
    pub deployed_bytecode: String,
    #[serde(default)]
    pub link_references: LinkReferences,
    #[serde(default)]
    pub deployed_link_references: LinkReferences,
}

impl Artifact {
    /// The `<sourceName>:<ContractName>` identifier of this contract.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }
}

/// Split a fully qualified name into its source and contract parts.
pub fn parse_fully_qualified_name(name: &str) -> Option<(&str, &str)> {
    let (source, contract) = name.rsplit_once(':')?;
    if source.is_empty() || contract.is_empty() {
        return None;
    }
    Some((source, contract))
}

/// Read access to the artifacts directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The artifacts root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact file of a contract.
    pub fn artifact_path(&self, source_name: &str, contract_name: &str) -> PathBuf {
        self.root
            .join(source_name)
            .join(format!("{}.json", contract_name))
    }

    /// Fully qualified names of every stored artifact, sorted.
    pub fn all_fully_qualified_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if self.root.is_dir() {
            self.collect_names(&self.root, &mut names)?;
        }
        names.sort();
        Ok(names)
    }

    fn collect_names(&self, dir: &Path, names: &mut Vec<String>) -> Result<()> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();

            if path.is_dir() {
                if dir == self.root.as_path() && path.file_name().is_some_and(|n| n == BUILD_INFO_DIR) {
                    continue;
                }
                self.collect_names(&path, names)?;
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(contract) = file_name.strip_suffix(".json") else {
                continue;
            };
            if contract.ends_with(".dbg") {
                continue;
            }

            let Some(source_dir) = path.parent() else {
                continue;
            };
            let source_name = source_dir
                .strip_prefix(&self.root)
                .with_context(|| format!("Artifact outside of {}", self.root.display()))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if source_name.is_empty() {
                continue;
            }

            names.push(format!("{}:{}", source_name, contract));
        }

        Ok(())
    }

    /// Resolve a bare contract name or a fully qualified name to a single fully
    /// qualified name.
    pub fn resolve_name(&self, name: &str) -> Result<String> {
        let names = self.all_fully_qualified_names()?;

        if parse_fully_qualified_name(name).is_some() {
            if names.iter().any(|n| n == name) {
                return Ok(name.to_string());
            }
            anyhow::bail!(
                "Artifact for contract \"{}\" not found in {}",
                name,
                self.root.display()
            );
        }

        let matches: Vec<&String> = names
            .iter()
            .filter(|fqn| parse_fully_qualified_name(fqn).is_some_and(|(_, c)| c == name))
            .collect();

        match matches.as_slice() {
            [] => anyhow::bail!(
                "Artifact for contract \"{}\" not found in {}. Did you compile the contracts?",
                name,
                self.root.display()
            ),
            [single] => Ok((*single).clone()),
            several => anyhow::bail!(
                "There are multiple artifacts for contract \"{}\", use one of these fully qualified names instead: {}",
                name,
                several
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Read the artifact of a contract, by bare or fully qualified name.
    pub fn read_artifact(&self, name: &str) -> Result<Artifact> {
        let fqn = self.resolve_name(name)?;
        let (source_name, contract_name) = parse_fully_qualified_name(&fqn)
            .with_context(|| format!("Invalid fully qualified name '{}'", fqn))?;

        let path = self.artifact_path(source_name, contract_name);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let artifact: Artifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        if artifact.format != ARTIFACT_FORMAT {
            anyhow::bail!(
                "Unsupported artifact format '{}' in {}",
                artifact.format,
                path.display()
            );
        }

        tracing::debug!(contract = %fqn, path = %path.display(), "Artifact loaded");

        Ok(artifact)
    }

    /// Write an artifact to its canonical location.
    pub fn save_artifact(&self, artifact: &Artifact) -> Result<PathBuf> {
        let path = self.artifact_path(&artifact.source_name, &artifact.contract_name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(artifact).context("Failed to serialize artifact")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write artifact {}", path.display()))?;

        Ok(path)
    }

    /// Delete the artifact of a contract if it exists.
    pub fn remove_artifact(&self, fully_qualified_name: &str) -> Result<()> {
        let (source_name, contract_name) = parse_fully_qualified_name(fully_qualified_name)
            .with_context(|| format!("Invalid fully qualified name '{}'", fully_qualified_name))?;
        let path = self.artifact_path(source_name, contract_name);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove artifact {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempdir::TempDir;

    pub(crate) fn artifact(source_name: &str, contract_name: &str, abi: &str, bytecode: &str) -> Artifact {
        Artifact {
            format: ARTIFACT_FORMAT.to_string(),
            contract_name: contract_name.to_string(),
            source_name: source_name.to_string(),
            abi: serde_json::from_str(abi).unwrap(),
            bytecode: bytecode.to_string(),
            deployed_bytecode: "0x".to_string(),
            link_references: LinkReferences::new(),
            deployed_link_references: LinkReferences::new(),
        }
    }

    #[test]
    fn test_parse_fully_qualified_name() {
        assert_eq!(
            parse_fully_qualified_name("contracts/EthStreamer.sol:EthStreamer"),
            Some(("contracts/EthStreamer.sol", "EthStreamer"))
        );
        assert_eq!(parse_fully_qualified_name("EthStreamer"), None);
        assert_eq!(parse_fully_qualified_name(":EthStreamer"), None);
        assert_eq!(parse_fully_qualified_name("contracts/EthStreamer.sol:"), None);
    }

    #[test]
    fn test_save_and_read_by_bare_and_qualified_name() {
        let dir = TempDir::new("streamer-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path());

        let saved = artifact("contracts/EthStreamer.sol", "EthStreamer", "[]", "0x6080");
        let path = store.save_artifact(&saved).unwrap();
        assert!(path.ends_with("contracts/EthStreamer.sol/EthStreamer.json"));

        let by_name = store.read_artifact("EthStreamer").unwrap();
        assert_eq!(by_name.fully_qualified_name(), "contracts/EthStreamer.sol:EthStreamer");
        assert_eq!(by_name.bytecode, "0x6080");

        let by_fqn = store
            .read_artifact("contracts/EthStreamer.sol:EthStreamer")
            .unwrap();
        assert_eq!(by_fqn.contract_name, "EthStreamer");
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new("streamer-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path().join("artifacts"));

        let err = store.read_artifact("EthStreamer").unwrap_err().to_string();
        assert!(err.contains("EthStreamer"));
        assert!(err.contains("not found"));

        assert!(store.read_artifact("contracts/EthStreamer.sol:EthStreamer").is_err());
    }

    #[test]
    fn test_ambiguous_artifact_name() {
        let dir = TempDir::new("streamer-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path());

        store
            .save_artifact(&artifact("contracts/EthStreamer.sol", "EthStreamer", "[]", "0x00"))
            .unwrap();
        store
            .save_artifact(&artifact("contracts/legacy/EthStreamer.sol", "EthStreamer", "[]", "0x00"))
            .unwrap();

        let err = store.read_artifact("EthStreamer").unwrap_err().to_string();
        assert!(err.contains("contracts/EthStreamer.sol:EthStreamer"));
        assert!(err.contains("contracts/legacy/EthStreamer.sol:EthStreamer"));

        assert!(
            store
                .read_artifact("contracts/legacy/EthStreamer.sol:EthStreamer")
                .is_ok()
        );
    }

    #[test]
    fn test_build_info_and_debug_files_are_ignored() {
        let dir = TempDir::new("streamer-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path());

        store
            .save_artifact(&artifact("contracts/Token.sol", "Token", "[]", "0x00"))
            .unwrap();
        std::fs::create_dir_all(dir.path().join(BUILD_INFO_DIR)).unwrap();
        std::fs::write(dir.path().join(BUILD_INFO_DIR).join("abcd.json"), "{}").unwrap();
        std::fs::write(
            dir.path().join("contracts/Token.sol/Token.dbg.json"),
            "{}",
        )
        .unwrap();

        assert_eq!(
            store.all_fully_qualified_names().unwrap(),
            vec!["contracts/Token.sol:Token".to_string()]
        );
    }

    #[test]
    fn test_unsupported_format_is_rejected() {
        let dir = TempDir::new("streamer-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path());

        let mut saved = artifact("contracts/EthStreamer.sol", "EthStreamer", "[]", "0x00");
        saved.format = "something-else".to_string();
        store.save_artifact(&saved).unwrap();

        assert!(store.read_artifact("EthStreamer").is_err());
    }

    #[test]
    fn test_remove_artifact() {
        let dir = TempDir::new("streamer-artifacts").unwrap();
        let store = ArtifactStore::new(dir.path());

        store
            .save_artifact(&artifact("contracts/Old.sol", "Old", "[]", "0x00"))
            .unwrap();
        store.remove_artifact("contracts/Old.sol:Old").unwrap();
        assert!(store.all_fully_qualified_names().unwrap().is_empty());
    }
}
