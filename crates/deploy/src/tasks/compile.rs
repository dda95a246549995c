use std::io::Write;

use anyhow::Result;

use super::StreamerTask;
use crate::{compiler::CompileOutcome, runtime::Runtime};

/// Compile the project sources into artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Compile {
    /// Recompile even when the cache is up to date.
    pub force: bool,
}

impl StreamerTask for Compile {
    const TASK_NAME: &'static str = "compile";
    const DESCRIPTION: &'static str = "Compiles the entire project";

    type Output = CompileOutcome;

    async fn run<W: Write>(self, rt: &Runtime, out: &mut W) -> Result<CompileOutcome> {
        let outcome = rt.compiler().compile(self.force).await?;

        match &outcome {
            CompileOutcome::UpToDate => writeln!(out, "Nothing to compile")?,
            CompileOutcome::Compiled(contracts) => writeln!(
                out,
                "Compiled {} Solidity {}",
                contracts.len(),
                if contracts.len() == 1 { "contract" } else { "contracts" }
            )?,
        }

        Ok(outcome)
    }
}
