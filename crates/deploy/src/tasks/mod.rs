//! Tasks runnable from the command line.

use std::{future::Future, io::Write};

use anyhow::Result;

use crate::runtime::Runtime;

mod accounts;
mod compile;
mod deploy_eth_streamer;

pub use accounts::{AccountRow, Accounts};
pub use compile::Compile;
pub use deploy_eth_streamer::{DeployEthStreamer, DeploymentReport, ETH_STREAMER};

/// A named unit of work run against a [`Runtime`].
///
/// Tasks write their user-facing output to `out`; diagnostics go through `tracing`.
pub trait StreamerTask {
    /// Name of the task on the command line.
    const TASK_NAME: &'static str;

    /// One line description.
    const DESCRIPTION: &'static str;

    /// Value returned by a successful run.
    type Output;

    /// Run the task to completion.
    fn run<W: Write>(self, rt: &Runtime, out: &mut W) -> impl Future<Output = Result<Self::Output>>;
}
