//! Contract factories and deployments.

use std::time::Duration;

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::{JsonAbi, Param},
    primitives::{Address, B256, Bytes, U64, U256},
};
use anyhow::{Context, Result};

use crate::{
    address::parse_address,
    artifacts::Artifact,
    rpc::{CallRequest, EthRpc, TransactionReceipt},
    signer::Signer,
    transaction::{Fees, UnsignedTransaction},
};

/// Network parameters a deployment needs besides the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    /// Chain ID used when signing locally.
    pub chain_id: u64,
    /// Fixed gas limit, estimated when `None`.
    pub gas: Option<u64>,
}

/// Bytecode and ABI of a contract, ready to create instances.
#[derive(Debug, Clone)]
pub struct ContractFactory {
    name: String,
    abi: JsonAbi,
    bytecode: Bytes,
}

impl ContractFactory {
    /// Build a factory from a compiled artifact.
    ///
    /// Fails for abstract contracts and interfaces (empty bytecode) and for contracts whose
    /// bytecode still needs library addresses.
    pub fn from_artifact(artifact: &Artifact) -> Result<Self> {
        let name = artifact.fully_qualified_name();

        if !artifact.link_references.is_empty() || artifact.bytecode.contains("__") {
            let libraries = artifact
                .link_references
                .iter()
                .flat_map(|(source, libs)| libs.keys().map(move |lib| format!("{}:{}", source, lib)))
                .collect::<Vec<_>>();
            anyhow::bail!(
                "The contract {} needs linking to libraries that are not supported: {}",
                name,
                libraries.join(", ")
            );
        }

        let hex_code = artifact
            .bytecode
            .strip_prefix("0x")
            .unwrap_or(&artifact.bytecode);
        let bytecode = hex::decode(hex_code)
            .with_context(|| format!("Invalid bytecode in artifact of {}", name))?;

        if bytecode.is_empty() {
            anyhow::bail!(
                "The contract {} is abstract or an interface and can't be deployed",
                name
            );
        }

        Ok(Self {
            name,
            abi: artifact.abi.clone(),
            bytecode: bytecode.into(),
        })
    }

    /// Fully qualified name of the contract.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    /// Constructor parameters, empty when the contract declares no constructor.
    pub fn constructor_inputs(&self) -> &[Param] {
        self.abi
            .constructor()
            .map(|c| c.inputs.as_slice())
            .unwrap_or(&[])
    }

    /// ABI-encode constructor arguments given as strings.
    ///
    /// The argument count must match the constructor arity exactly.
    pub fn encode_constructor_args(&self, args: &[String]) -> Result<Bytes> {
        let inputs = self.constructor_inputs();

        if inputs.len() != args.len() {
            anyhow::bail!(
                "Incorrect number of arguments to the constructor of {}: expected {} ({}), got {}",
                self.name,
                inputs.len(),
                inputs
                    .iter()
                    .map(|p| p.selector_type().into_owned())
                    .collect::<Vec<_>>()
                    .join(", "),
                args.len()
            );
        }

        if inputs.is_empty() {
            return Ok(Bytes::new());
        }

        let values = inputs
            .iter()
            .zip(args)
            .map(|(param, arg)| coerce_argument(param, arg))
            .collect::<Result<Vec<_>>>()?;

        Ok(DynSolValue::Tuple(values).abi_encode_params().into())
    }

    /// Creation bytecode followed by the encoded constructor arguments.
    pub fn deploy_data(&self, args: &[String]) -> Result<Bytes> {
        let encoded = self.encode_constructor_args(args)?;
        let mut data = Vec::with_capacity(self.bytecode.len() + encoded.len());
        data.extend_from_slice(&self.bytecode);
        data.extend_from_slice(&encoded);
        Ok(data.into())
    }

    /// Submit the deployment transaction.
    ///
    /// Returns as soon as the node accepted the transaction; it is not mined yet.
    pub async fn deploy(
        &self,
        rpc: &EthRpc,
        signer: &Signer,
        args: &[String],
        options: &DeployOptions,
    ) -> Result<PendingDeployment> {
        let data = self.deploy_data(args)?;
        let deployer = signer.address();

        let mut request = CallRequest {
            from: deployer,
            data,
            ..Default::default()
        };

        let gas = match options.gas {
            Some(gas) => gas,
            None => rpc
                .estimate_gas(&request)
                .await
                .with_context(|| format!("Failed to estimate gas to deploy {}", self.name))?,
        };

        let pending = match signer {
            Signer::Remote(_) => {
                request.gas = Some(U64::from(gas));
                let tx_hash = rpc
                    .send_transaction(&request)
                    .await
                    .with_context(|| format!("Failed to send deployment of {}", self.name))?;

                PendingDeployment {
                    contract: self.name.clone(),
                    tx_hash,
                    deployer,
                    expected_address: None,
                }
            }
            Signer::Local(key) => {
                let nonce = rpc.transaction_count(deployer).await?;
                let base_fee = rpc
                    .latest_base_fee()
                    .await
                    .context("Failed to get the latest base fee")?;
                // The tip only matters for dynamic fee transactions.
                let priority_fee = match base_fee {
                    Some(_) => rpc
                        .max_priority_fee_per_gas()
                        .await
                        .context("Failed to get the max priority fee per gas")?,
                    None => U256::ZERO,
                };
                let gas_price = rpc.gas_price().await.context("Failed to get the gas price")?;
                let fees = Fees::from_market(base_fee, priority_fee, gas_price);

                let tx = UnsignedTransaction {
                    chain_id: options.chain_id,
                    nonce,
                    gas_limit: gas,
                    fees,
                    to: None,
                    value: U256::ZERO,
                    input: request.data,
                };
                let signed = tx.sign(key)?;

                tracing::debug!(
                    tx_type = %tx.tx_type(),
                    nonce,
                    gas,
                    "Broadcasting locally signed deployment"
                );

                let tx_hash = rpc
                    .send_raw_transaction(&signed.raw)
                    .await
                    .with_context(|| format!("Failed to send deployment of {}", self.name))?;

                if tx_hash != signed.hash {
                    tracing::warn!(
                        expected = %signed.hash,
                        returned = %tx_hash,
                        "Node returned an unexpected transaction hash"
                    );
                }

                PendingDeployment {
                    contract: self.name.clone(),
                    tx_hash,
                    deployer,
                    expected_address: Some(deployer.create(nonce)),
                }
            }
        };

        tracing::info!(
            contract = %self.name,
            tx_hash = %pending.tx_hash,
            deployer = %deployer,
            gas,
            "Deployment transaction sent"
        );

        Ok(pending)
    }
}

/// Convert a string argument to the ABI value of a parameter.
fn coerce_argument(param: &Param, arg: &str) -> Result<DynSolValue> {
    let ty: DynSolType = param
        .resolve()
        .with_context(|| format!("Unsupported constructor parameter type '{}'", param.ty))?;

    let label = if param.name.is_empty() {
        param.ty.clone()
    } else {
        format!("{} {}", param.ty, param.name)
    };

    if ty == DynSolType::Address {
        let address = parse_address(arg)
            .with_context(|| format!("Invalid value for constructor parameter '{}'", label))?;
        return Ok(DynSolValue::Address(address));
    }

    ty.coerce_str(arg)
        .with_context(|| format!("Invalid value '{}' for constructor parameter '{}'", arg, label))
}

/// A deployment transaction accepted by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeployment {
    pub contract: String,
    pub tx_hash: B256,
    pub deployer: Address,
    /// CREATE address, known upfront when the nonce was chosen locally.
    pub expected_address: Option<Address>,
}

/// A contract instance confirmed on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: U256,
}

impl PendingDeployment {
    /// Wait until the deployment transaction is mined.
    ///
    /// There is no deadline: the receipt is polled until it shows up. Request failures,
    /// reverted transactions and missing code at the new address are errors.
    pub async fn wait_for_deployment(
        &self,
        rpc: &EthRpc,
        poll_interval: Duration,
    ) -> Result<DeployedContract> {
        tracing::info!(tx_hash = %self.tx_hash, "Waiting for deployment confirmation...");

        let receipt = loop {
            if let Some(receipt) = rpc
                .transaction_receipt(self.tx_hash)
                .await
                .with_context(|| format!("Failed to get receipt of {}", self.tx_hash))?
            {
                break receipt;
            }
            tracing::trace!(tx_hash = %self.tx_hash, "Deployment not mined yet");
            tokio::time::sleep(poll_interval).await;
        };

        self.confirm(rpc, receipt).await
    }

    async fn confirm(&self, rpc: &EthRpc, receipt: TransactionReceipt) -> Result<DeployedContract> {
        if receipt.reverted() {
            anyhow::bail!(
                "Deployment of {} reverted (transaction {})",
                self.contract,
                self.tx_hash
            );
        }

        let address = receipt.contract_address.with_context(|| {
            format!(
                "Receipt of transaction {} carries no contract address",
                self.tx_hash
            )
        })?;

        if let Some(expected) = self.expected_address {
            if expected != address {
                tracing::warn!(%expected, %address, "Contract deployed at an unexpected address");
            }
        }

        let code = rpc.code(address).await?;
        if code.is_empty() {
            anyhow::bail!(
                "Deployment of {} returned no code at {}",
                self.contract,
                address
            );
        }

        let deployed = DeployedContract {
            address,
            tx_hash: self.tx_hash,
            block_number: receipt.block_number.map(|n| n.to()),
            gas_used: receipt.gas_used,
        };

        tracing::info!(
            contract = %self.contract,
            address = %deployed.address,
            block = ?deployed.block_number,
            gas_used = %deployed.gas_used,
            "Deployment confirmed"
        );

        Ok(deployed)
    }
}
