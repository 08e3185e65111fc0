//! ReVpk CLI - Command-line interface for VPK packed stores

pub mod commands;
pub mod progress;

use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use commands::Commands;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "revpk")]
#[command(about = "ReVpk: build and extract Respawn VPK packed stores", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run the ReVpk CLI
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.command.log_file().as_deref())?;
    cli.command.execute()?;

    Ok(())
}

/// Install the global subscriber: console output filtered by `RUST_LOG`
/// (default `info`), plus a plain-text copy in `log_file` if given.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(())
}
