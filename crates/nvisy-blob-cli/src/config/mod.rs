//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── store: StoreArgs   # Provider selection and Azure credentials
//! └── command: Command   # upload | download | read | list | delete-blob | delete-container
//! ```
//!
//! Store options can be given as arguments or environment variables; task
//! options are given as arguments of the subcommand.
//!
//! ```bash
//! AZURE_STORAGE_CONNECTION_STRING="..." nvisy-blob --provider azure list reports
//! nvisy-blob --provider azure --connection-method oauth2 \
//!     --tenant-id ... --application-id ... --client-secret ... \
//!     --storage-account-name acme download reports q3.csv --directory ./out
//! ```

mod command;
mod store;

use clap::Parser;
pub use command::Command;
pub use store::StoreArgs;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "nvisy-blob")]
#[command(about = "Upload, download, read, list and delete blobs")]
#[command(version)]
pub struct Cli {
    /// Storage provider and credentials.
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Task to run.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Logs configuration at debug level (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            provider = %self.store.provider,
            connection_method = %self.store.connection_method,
            storage_account_name = ?self.store.storage_account_name,
            command = self.command.name(),
            "Store configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "azure").then_some("azure"),
            cfg!(feature = "dotenv").then_some("dotenv"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_store_options() {
        let cli = Cli::try_parse_from([
            "nvisy-blob",
            "--provider",
            "azure",
            "--connection-string",
            "UseDevelopmentStorage=true",
            "list",
            "reports",
        ])
        .unwrap();

        assert_eq!(cli.store.provider, store::ProviderKind::Azure);
        assert_eq!(cli.command.name(), "list");
    }
}
