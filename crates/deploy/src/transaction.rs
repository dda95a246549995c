//! Locally signed transactions.
//!
//! Only what deployments need: legacy (EIP-155) and dynamic fee (EIP-1559) envelopes with
//! an empty access list.

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};

/// Transaction envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum TxType {
    Legacy,
    #[strum(serialize = "eip1559")]
    Eip1559,
}

/// Fee parameters of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fees {
    Legacy {
        gas_price: U256,
    },
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl Fees {
    /// Pick EIP-1559 fees when the chain reports a base fee, legacy pricing otherwise.
    ///
    /// The max fee leaves room for the base fee to double before inclusion.
    pub fn from_market(base_fee: Option<U256>, priority_fee: U256, gas_price: U256) -> Self {
        match base_fee {
            Some(base_fee) => Self::Eip1559 {
                max_fee_per_gas: base_fee
                    .saturating_mul(U256::from(2))
                    .saturating_add(priority_fee),
                max_priority_fee_per_gas: priority_fee,
            },
            None => Self::Legacy { gas_price },
        }
    }
}

/// A transaction ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    pub fees: Fees,
    /// `None` creates a contract.
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
}

/// A signed, encoded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// EIP-2718 encoding, as passed to `eth_sendRawTransaction`.
    pub raw: Vec<u8>,
    /// Transaction hash.
    pub hash: B256,
    pub envelope: TxEnvelope,
}

impl UnsignedTransaction {
    pub fn tx_type(&self) -> TxType {
        match self.fees {
            Fees::Legacy { .. } => TxType::Legacy,
            Fees::Eip1559 { .. } => TxType::Eip1559,
        }
    }

    fn kind(&self) -> TxKind {
        self.to.map_or(TxKind::Create, TxKind::Call)
    }

    /// Sign with a local key and encode for broadcast.
    pub fn sign(&self, signer: &PrivateKeySigner) -> Result<SignedTransaction> {
        let envelope: TxEnvelope = match self.fees {
            Fees::Legacy { gas_price } => {
                let mut tx = TxLegacy {
                    chain_id: Some(self.chain_id),
                    nonce: self.nonce,
                    gas_price: gas_price.saturating_to(),
                    gas_limit: self.gas_limit,
                    to: self.kind(),
                    value: self.value,
                    input: self.input.clone(),
                };
                let signature = signer
                    .sign_transaction_sync(&mut tx)
                    .context("Failed to sign legacy transaction")?;
                tx.into_signed(signature).into()
            }
            Fees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut tx = TxEip1559 {
                    chain_id: self.chain_id,
                    nonce: self.nonce,
                    gas_limit: self.gas_limit,
                    max_fee_per_gas: max_fee_per_gas.saturating_to(),
                    max_priority_fee_per_gas: max_priority_fee_per_gas.saturating_to(),
                    to: self.kind(),
                    value: self.value,
                    input: self.input.clone(),
                    ..Default::default()
                };
                let signature = signer
                    .sign_transaction_sync(&mut tx)
                    .context("Failed to sign EIP-1559 transaction")?;
                tx.into_signed(signature).into()
            }
        };

        Ok(SignedTransaction {
            raw: envelope.encoded_2718(),
            hash: *envelope.tx_hash(),
            envelope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::transaction::SignerRecoverable;
    use alloy_core::primitives::keccak256;
    use alloy_eips::eip2718::Decodable2718;

    fn signer(hex_key: &str) -> PrivateKeySigner {
        hex_key.parse().unwrap()
    }

    fn decode(signed: &SignedTransaction) -> TxEnvelope {
        TxEnvelope::decode_2718(&mut signed.raw.as_slice()).unwrap()
    }

    // Example transaction from EIP-155.
    fn eip155_example() -> UnsignedTransaction {
        UnsignedTransaction {
            chain_id: 1,
            nonce: 9,
            gas_limit: 21000,
            fees: Fees::Legacy {
                gas_price: U256::from(20_000_000_000u64),
            },
            to: Some(Address::repeat_byte(0x35)),
            value: U256::from(1_000_000_000_000_000_000u64),
            input: Bytes::new(),
        }
    }

    #[test]
    fn test_eip155_signed_encoding() {
        let key = signer("4646464646464646464646464646464646464646464646464646464646464646");
        let signed = eip155_example().sign(&key).unwrap();

        assert_eq!(
            hex::encode(&signed.raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(signed.hash, keccak256(&signed.raw));
        assert_eq!(decode(&signed).recover_signer().unwrap(), key.address());
    }

    #[test]
    fn test_eip1559_contract_creation() {
        let tx = UnsignedTransaction {
            chain_id: 31337,
            nonce: 5,
            gas_limit: 500_000,
            fees: Fees::Eip1559 {
                max_fee_per_gas: U256::from(3_000_000_000u64),
                max_priority_fee_per_gas: U256::from(1_000_000_000u64),
            },
            to: None,
            value: U256::ZERO,
            input: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]),
        };
        let key = signer("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");
        let signed = tx.sign(&key).unwrap();

        assert_eq!(tx.tx_type(), TxType::Eip1559);
        assert_eq!(signed.raw[0], 0x02);
        assert_eq!(signed.hash, keccak256(&signed.raw));

        let decoded = decode(&signed);
        assert_eq!(*decoded.tx_hash(), signed.hash);
        assert_eq!(decoded.recover_signer().unwrap(), key.address());

        let inner = decoded.as_eip1559().unwrap().tx();
        assert_eq!(inner.chain_id, 31337);
        assert_eq!(inner.nonce, 5);
        assert_eq!(inner.to, TxKind::Create);
        assert_eq!(inner.max_priority_fee_per_gas, 1_000_000_000);
        assert_eq!(inner.input, tx.input);
    }

    #[test]
    fn test_large_chain_id_does_not_overflow() {
        let mut tx = eip155_example();
        tx.chain_id = u64::MAX / 2 + 1;
        let key = signer("4646464646464646464646464646464646464646464646464646464646464646");

        let signed = tx.sign(&key).unwrap();
        assert_eq!(
            signed.envelope.as_legacy().unwrap().tx().chain_id,
            Some(u64::MAX / 2 + 1)
        );
        assert_eq!(signed.envelope.recover_signer().unwrap(), key.address());
    }

    #[test]
    fn test_fees_from_market() {
        let fees = Fees::from_market(Some(U256::from(10)), U256::from(2), U256::from(7));
        assert_eq!(
            fees,
            Fees::Eip1559 {
                max_fee_per_gas: U256::from(22),
                max_priority_fee_per_gas: U256::from(2),
            }
        );

        let fees = Fees::from_market(None, U256::from(2), U256::from(7));
        assert_eq!(fees, Fees::Legacy { gas_price: U256::from(7) });
    }

    #[test]
    fn test_tx_type_display() {
        assert_eq!(TxType::Legacy.to_string(), "legacy");
        assert_eq!(TxType::Eip1559.to_string(), "eip1559");
    }
}
