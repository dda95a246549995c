use std::io::Write;

use alloy_core::primitives::{Address, U256, utils::format_ether};
use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL};

use super::StreamerTask;
use crate::runtime::Runtime;

/// List the signers of the network with their balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accounts;

/// One listed signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub address: Address,
    pub balance: U256,
    pub remote: bool,
}

impl StreamerTask for Accounts {
    const TASK_NAME: &'static str = "accounts";
    const DESCRIPTION: &'static str = "Prints the list of accounts";

    type Output = Vec<AccountRow>;

    async fn run<W: Write>(self, rt: &Runtime, out: &mut W) -> Result<Vec<AccountRow>> {
        let signers = rt.get_signers().await?;

        let mut rows = Vec::with_capacity(signers.len());
        for signer in signers.iter() {
            let address = signer.address();
            let balance = rt
                .rpc()
                .balance(address)
                .await
                .with_context(|| format!("Failed to get balance of {}", address))?;
            rows.push(AccountRow {
                address,
                balance,
                remote: signer.is_remote(),
            });
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["#", "Address", "Balance (ETH)", "Signer"]);
        for (i, row) in rows.iter().enumerate() {
            table.add_row(vec![
                i.to_string(),
                row.address.to_string(),
                format_ether(row.balance),
                if row.remote { "remote" } else { "local" }.to_string(),
            ]);
        }

        writeln!(out, "{}", table)?;

        Ok(rows)
    }
}
