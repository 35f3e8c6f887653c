#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod shutdown;
mod telemetry;

use std::process;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "nvisy_blob_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "nvisy_blob_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "nvisy_blob_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %format!("{error:#}"),
            "command failed"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    telemetry::init_tracing()?;
    cli.log();

    let config = cli
        .store
        .to_store_config()
        .context("invalid store configuration")?;
    let store = nvisy_blob::providers::connect(&config)
        .await
        .context("failed to connect to blob storage")?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_signal(cancel.clone()));

    let output = cli.command.execute(store.as_ref(), &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
