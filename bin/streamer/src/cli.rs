use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "streamer")]
#[command(author, version, about = "Compile and deploy the EthStreamer contract")]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STREAMER_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the project configuration file, or to the project directory.
    ///
    /// If not provided, `Streamer.toml` is looked up in the current directory and defaults
    /// apply when it does not exist.
    #[arg(short, long, env = "STREAMER_CONFIG")]
    pub config: Option<PathBuf>,

    /// The network to connect to. Defaults to the `default_network` of the configuration.
    #[arg(short, long, env = "STREAMER_NETWORK")]
    pub network: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Writes a default Streamer.toml.
    Init,

    /// Compiles the entire project.
    Compile {
        /// Force a compilation even if the sources did not change.
        #[arg(long)]
        force: bool,
    },

    /// Prints the list of accounts.
    Accounts,

    /// Deploys the EthStreamer contract.
    DeployEthStreamer {
        /// A constructor argument. Repeat for each parameter of the constructor.
        #[arg(long = "arg", value_name = "VALUE")]
        constructor_args: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use streamer_deploy::{
        StreamerTask,
        tasks::{Accounts, Compile, DeployEthStreamer},
    };

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subcommands_match_task_names() {
        let cmd = Cli::command();
        let names = cmd
            .get_subcommands()
            .map(|c| c.get_name().to_string())
            .collect::<Vec<_>>();

        for task in [Compile::TASK_NAME, Accounts::TASK_NAME, DeployEthStreamer::TASK_NAME] {
            assert!(names.iter().any(|n| n == task), "missing subcommand {}", task);
        }
    }

    #[test]
    fn test_repeated_constructor_args() {
        let cli = Cli::try_parse_from([
            "streamer",
            "--network",
            "sepolia",
            "deploy-eth-streamer",
            "--arg",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "--arg",
            "42",
        ])
        .unwrap();

        assert_eq!(cli.network.as_deref(), Some("sepolia"));
        assert_eq!(
            cli.command,
            Command::DeployEthStreamer {
                constructor_args: vec![
                    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string(),
                    "42".to_string()
                ],
            }
        );
    }

    #[test]
    fn test_compile_force_flag() {
        let cli = Cli::try_parse_from(["streamer", "compile", "--force"]).unwrap();
        assert_eq!(cli.command, Command::Compile { force: true });
    }
}
