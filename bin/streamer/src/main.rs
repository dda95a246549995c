//! streamer is a CLI tool to compile and deploy the EthStreamer contract.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use streamer_deploy::{
    CONFIG_FILENAME, Runtime, RuntimeBuilder, StreamerConfig, StreamerTask,
    tasks::{Accounts, Compile, DeployEthStreamer},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, task output to stdout.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    let (root, config_path) = project_paths(cli.config.as_deref());

    let required = cli.config.is_some();
    let mut out = std::io::stdout().lock();

    match cli.command {
        Command::Init => init_config(&config_path)?,
        Command::Compile { force } => {
            let runtime = build_runtime(root, &config_path, required, cli.network)?;
            Compile { force }.run(&runtime, &mut out).await?;
        }
        Command::Accounts => {
            let runtime = build_runtime(root, &config_path, required, cli.network)?;
            Accounts.run(&runtime, &mut out).await?;
        }
        Command::DeployEthStreamer { constructor_args } => {
            let runtime = build_runtime(root, &config_path, required, cli.network)?;
            DeployEthStreamer { constructor_args }
                .run(&runtime, &mut out)
                .await?;
        }
    }

    Ok(())
}

/// Load the configuration and bind it to the selected network.
fn build_runtime(
    root: PathBuf,
    config_path: &Path,
    required: bool,
    network: Option<String>,
) -> Result<Runtime> {
    let config = StreamerConfig::load(config_path, required)?;
    let runtime = RuntimeBuilder::new(config)
        .root(root)
        .network(network)
        .build()?;

    tracing::info!(
        network = runtime.network_name(),
        url = %runtime.network().url,
        "Running task..."
    );

    Ok(runtime)
}

/// Project root and configuration file for the `--config` argument.
fn project_paths(config: Option<&Path>) -> (PathBuf, PathBuf) {
    match config {
        Some(path) if path.is_dir() => (path.to_path_buf(), path.join(CONFIG_FILENAME)),
        Some(path) => {
            let root = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (root, path.to_path_buf())
        }
        None => (PathBuf::from("."), PathBuf::from(CONFIG_FILENAME)),
    }
}

/// Write the default configuration, refusing to overwrite an existing file.
fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Configuration file already exists: {}", path.display());
    }

    StreamerConfig::default().save_to_file(path)?;
    println!("Created {}", path.display());

    Ok(())
}
