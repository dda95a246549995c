//! JSON-RPC utilities for interacting with Ethereum nodes.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    tracing::trace!(method, url, "Sending JSON-RPC request");

    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request to {}", method, url))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error on {}: {}",
            method,
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .with_context(|| format!("No result in {} response", method))?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<U64>,
    pub from: Address,
    pub contract_address: Option<Address>,
    pub gas_used: U256,
    /// `1` on success, `0` on revert. Absent on pre-Byzantium chains.
    pub status: Option<U64>,
}

impl TransactionReceipt {
    /// Whether the transaction was reverted.
    pub fn reverted(&self) -> bool {
        self.status == Some(U64::ZERO)
    }
}

/// Subset of a block header used for fee selection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockFees {
    base_fee_per_gas: Option<U256>,
}

/// Fields of a transaction request, as accepted by `eth_estimateGas` and
/// `eth_sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CallRequest {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    pub data: Bytes,
}

/// Typed wrapper over the `eth_*` methods used by the toolchain.
#[derive(Debug, Clone)]
pub struct EthRpc {
    client: reqwest::Client,
    url: Url,
}

impl EthRpc {
    /// Create a client for the given endpoint.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: create_client(timeout)?,
            url,
        })
    }

    /// The endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }

    pub async fn chain_id(&self) -> Result<u64, anyhow::Error> {
        let id: U64 = self.call("eth_chainId", vec![]).await?;
        Ok(id.to())
    }

    /// Accounts managed by the node.
    pub async fn accounts(&self) -> Result<Vec<Address>, anyhow::Error> {
        self.call("eth_accounts", vec![]).await
    }

    pub async fn balance(&self, address: Address) -> Result<U256, anyhow::Error> {
        self.call(
            "eth_getBalance",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    /// Nonce of the next transaction from `address`, pending transactions included.
    pub async fn transaction_count(&self, address: Address) -> Result<u64, anyhow::Error> {
        let count: U64 = self
            .call(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("pending")],
            )
            .await?;
        Ok(count.to())
    }

    pub async fn gas_price(&self) -> Result<U256, anyhow::Error> {
        self.call("eth_gasPrice", vec![]).await
    }

    pub async fn max_priority_fee_per_gas(&self) -> Result<U256, anyhow::Error> {
        self.call("eth_maxPriorityFeePerGas", vec![]).await
    }

    /// Base fee of the latest block, `None` on chains without EIP-1559.
    pub async fn latest_base_fee(&self) -> Result<Option<U256>, anyhow::Error> {
        let block: Option<BlockFees> = self
            .call(
                "eth_getBlockByNumber",
                vec![serde_json::json!("latest"), serde_json::json!(false)],
            )
            .await?;
        let block = block.context("Latest block not found")?;
        Ok(block.base_fee_per_gas)
    }

    pub async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, anyhow::Error> {
        let gas: U64 = self
            .call("eth_estimateGas", vec![serde_json::json!(request)])
            .await?;
        Ok(gas.to())
    }

    /// Submit a transaction signed by the node.
    pub async fn send_transaction(&self, request: &CallRequest) -> Result<B256, anyhow::Error> {
        self.call("eth_sendTransaction", vec![serde_json::json!(request)])
            .await
    }

    /// Broadcast a locally signed transaction.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, anyhow::Error> {
        self.call(
            "eth_sendRawTransaction",
            vec![serde_json::json!(Bytes::copy_from_slice(raw))],
        )
        .await
    }

    /// Receipt of a transaction, `None` while it is pending.
    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, anyhow::Error> {
        self.call("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await
    }

    /// Runtime code deployed at `address`.
    pub async fn code(&self, address: Address) -> Result<Bytes, anyhow::Error> {
        self.call(
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }
}
