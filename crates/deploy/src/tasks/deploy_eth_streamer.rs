//! Deployment of the `EthStreamer` contract.

use std::io::Write;

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};

use super::StreamerTask;
use crate::runtime::Runtime;

/// Name of the deployed contract.
pub const ETH_STREAMER: &str = "EthStreamer";

/// Deploy one `EthStreamer` instance with the first signer of the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployEthStreamer {
    /// Constructor arguments, checked against the artifact ABI.
    pub constructor_args: Vec<String>,
}

/// What a successful deployment produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub deployer: Address,
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

impl StreamerTask for DeployEthStreamer {
    const TASK_NAME: &'static str = "deploy-eth-streamer";
    const DESCRIPTION: &'static str = "Deploys the EthStreamer contract";

    type Output = DeploymentReport;

    async fn run<W: Write>(self, rt: &Runtime, out: &mut W) -> Result<DeploymentReport> {
        let signers = rt.get_signers().await?;
        let deployer = signers
            .first()
            .with_context(|| format!("No accounts available on network '{}'", rt.network_name()))?;

        writeln!(out, "Deploying contracts with: {}", deployer.address())?;

        let factory = rt.get_contract_factory(ETH_STREAMER)?;
        rt.check_chain_id().await?;

        let pending = factory
            .deploy(rt.rpc(), deployer, &self.constructor_args, &rt.deploy_options())
            .await?;
        let deployed = pending.wait_for_deployment(rt.rpc(), rt.poll_interval()).await?;

        writeln!(out, "{} deployed at: {}", ETH_STREAMER, deployed.address)?;

        Ok(DeploymentReport {
            deployer: deployer.address(),
            address: deployed.address,
            tx_hash: deployed.tx_hash,
            block_number: deployed.block_number,
        })
    }
}
