//! streamer-deploy - Compile and deploy the EthStreamer contract.
//!
//! This crate provides the project configuration, the solc driver, the artifact store and
//! the tasks run by the `streamer` command line tool.

mod address;
pub use address::parse_address;

pub mod artifacts;
pub use artifacts::{Artifact, ArtifactStore};

pub mod compiler;
pub use compiler::{CompileOutcome, SolcCompiler};

pub mod config;
pub use config::{
    AccountsConfig, CONFIG_FILENAME, MnemonicConfig, NetworkConfig, StreamerConfig,
};

pub mod factory;
pub use factory::{ContractFactory, DeployOptions, DeployedContract, PendingDeployment};

pub mod rpc;
pub use rpc::EthRpc;

mod runtime;
pub use runtime::{Runtime, RuntimeBuilder};

mod signer;
pub use signer::{Signer, Signers};

pub mod tasks;
pub use tasks::StreamerTask;

pub mod transaction;
