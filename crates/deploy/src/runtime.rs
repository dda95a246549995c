//! Runtime environment handed to tasks.
//!
//! This module provides the [`RuntimeBuilder`] which binds a loaded configuration to a
//! project root and a selected network.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};

use crate::{
    artifacts::ArtifactStore,
    compiler::SolcCompiler,
    config::{NetworkConfig, StreamerConfig},
    factory::{ContractFactory, DeployOptions},
    rpc::EthRpc,
    signer::Signers,
};

/// Builder for [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeBuilder {
    config: StreamerConfig,
    root: PathBuf,
    network: Option<String>,
}

impl RuntimeBuilder {
    /// Create a builder for a configuration. The project root defaults to the current
    /// directory and the network to the configured default.
    pub fn new(config: StreamerConfig) -> Self {
        Self {
            config,
            root: PathBuf::from("."),
            network: None,
        }
    }

    /// Set the project root.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Select a network by name.
    pub fn network(mut self, name: Option<impl Into<String>>) -> Self {
        self.network = name.map(Into::into);
        self
    }

    /// Resolve the network and create its RPC client. No request is sent yet.
    pub fn build(self) -> Result<Runtime> {
        let network_name = self
            .network
            .unwrap_or_else(|| self.config.default_network.clone());

        let network = self.config.network(&network_name)?.clone();
        let url = network.rpc_url()?;
        let rpc = EthRpc::new(url, Duration::from_millis(network.timeout_ms))
            .with_context(|| format!("Failed to create RPC client for network '{}'", network_name))?;

        let artifacts = ArtifactStore::new(self.root.join(&self.config.paths.artifacts));

        tracing::debug!(
            network = %network_name,
            url = %network.url,
            chain_id = network.chain_id,
            root = %self.root.display(),
            "Runtime ready"
        );

        Ok(Runtime {
            config: self.config,
            root: self.root,
            network_name,
            network,
            rpc,
            artifacts,
        })
    }
}

/// Configuration, network connection and project files available to a task.
#[derive(Debug, Clone)]
pub struct Runtime {
    config: StreamerConfig,
    root: PathBuf,
    network_name: String,
    network: NetworkConfig,
    rpc: EthRpc,
    artifacts: ArtifactStore,
}

impl Runtime {
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn rpc(&self) -> &EthRpc {
        &self.rpc
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn compiler(&self) -> SolcCompiler {
        SolcCompiler::new(&self.root, &self.config)
    }

    /// Signers of the selected network, in configuration order.
    pub async fn get_signers(&self) -> Result<Signers> {
        Signers::resolve(&self.network.accounts, &self.rpc).await
    }

    /// Factory for a compiled contract, by simple or fully qualified name.
    pub fn get_contract_factory(&self, name: &str) -> Result<ContractFactory> {
        let artifact = self.artifacts.read_artifact(name)?;
        ContractFactory::from_artifact(&artifact)
    }

    /// Fail when the node serves another chain than the configured one.
    pub async fn check_chain_id(&self) -> Result<u64> {
        let actual = self
            .rpc
            .chain_id()
            .await
            .with_context(|| format!("Failed to get chain ID from {}", self.network.url))?;

        if actual != self.network.chain_id {
            anyhow::bail!(
                "The network '{}' is configured with chain ID {} but the node at {} reports {}",
                self.network_name,
                self.network.chain_id,
                self.network.url,
                actual
            );
        }

        Ok(actual)
    }

    pub fn deploy_options(&self) -> DeployOptions {
        DeployOptions {
            chain_id: self.network.chain_id,
            gas: self.network.gas,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.deploy.poll_interval_ms)
    }
}
