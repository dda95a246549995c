//! Signing accounts of a network.

use alloy_core::primitives::Address;
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};
use anyhow::{Context, Result};
use derive_more::{Deref, From};

use crate::{
    config::{AccountsConfig, MnemonicConfig},
    rpc::EthRpc,
};

/// An account able to authorize transactions.
#[derive(Debug, Clone)]
pub enum Signer {
    /// Key held by the node; transactions go through `eth_sendTransaction`.
    Remote(Address),
    /// Key held by this process; transactions are signed locally.
    Local(PrivateKeySigner),
}

impl Signer {
    pub fn address(&self) -> Address {
        match self {
            Self::Remote(address) => *address,
            Self::Local(signer) => signer.address(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Ordered list of the signers of a network. The first one deploys.
#[derive(Debug, Clone, Default, Deref, From)]
pub struct Signers(Vec<Signer>);

impl Signers {
    /// Resolve the configured accounts. Only remote accounts require the node.
    pub async fn resolve(accounts: &AccountsConfig, rpc: &EthRpc) -> Result<Self> {
        let signers = match accounts {
            AccountsConfig::Remote => rpc
                .accounts()
                .await
                .with_context(|| format!("Failed to list accounts from {}", rpc.url()))?
                .into_iter()
                .map(Signer::Remote)
                .collect(),
            AccountsConfig::PrivateKeys(keys) => keys
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    key.parse::<PrivateKeySigner>()
                        .map(Signer::Local)
                        .with_context(|| format!("Invalid private key #{}", i))
                })
                .collect::<Result<Vec<_>>>()?,
            AccountsConfig::Mnemonic(mnemonic) => derive_mnemonic_signers(mnemonic)?,
        };

        Ok(Self(signers))
    }
}

/// Derive `count` signers from a mnemonic, starting at `initial_index`.
pub fn derive_mnemonic_signers(mnemonic: &MnemonicConfig) -> Result<Vec<Signer>> {
    (mnemonic.initial_index..mnemonic.initial_index.saturating_add(mnemonic.count))
        .map(|index| {
            let path = format!("{}{}", mnemonic.path, index);
            let signer = MnemonicBuilder::<English>::default()
                .phrase(mnemonic.phrase.as_str())
                .derivation_path(&path)
                .with_context(|| format!("Invalid derivation path '{}'", path))?
                .build()
                .with_context(|| format!("Failed to derive account at '{}'", path))?;
            Ok(Signer::Local(signer))
        })
        .collect()
}
