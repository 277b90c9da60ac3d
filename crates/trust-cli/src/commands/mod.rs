//! Command implementations.
//!
//! Each command type holds the shared [`Context`] and writes its result
//! through an [`OutputFormat`](crate::output::OutputFormat).

mod query;
mod review;
mod transaction;

pub use query::QueryCommand;
pub use review::ReviewCommand;
pub use transaction::{TransactionCommand, advance_pending};

use std::path::{Path, PathBuf};

use tracing::info;
use trust_ledger::{BlockfrostProvider, LedgerConfig, PendingTransaction, ReviewLedger};

use crate::cli::Cli;
use crate::error::CliError;

/// Settings shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    config_path: Option<PathBuf>,
    network: Option<String>,
    blockfrost_key: Option<String>,
}

impl Context {
    /// Take the global options from parsed arguments.
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            config_path: cli.config.clone(),
            network: cli.network.clone(),
            blockfrost_key: cli.blockfrost_key.clone(),
        }
    }

    /// Load the configuration file, if any, and apply command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or an override is invalid.
    pub fn config(&self) -> Result<LedgerConfig, CliError> {
        let mut config = match &self.config_path {
            Some(path) => LedgerConfig::from_file(path)?,
            None => LedgerConfig::default(),
        };
        config.apply_overrides(self.blockfrost_key.clone(), self.network.clone())?;
        config.validate()?;
        Ok(config)
    }

    /// Connect a review ledger client over Blockfrost.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration lacks a project id or script.
    pub fn ledger(&self) -> Result<ReviewLedger<BlockfrostProvider>, CliError> {
        let config = self.config()?;
        let provider = BlockfrostProvider::from_config(&config)?;
        Ok(ReviewLedger::from_config(provider, config)?)
    }
}

/// Write a pending transaction as JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn save_pending(pending: &PendingTransaction, path: &Path) -> Result<(), CliError> {
    std::fs::write(path, pending.to_json()?)?;
    info!(path = %path.display(), stage = %pending.stage(), "saved pending transaction");
    Ok(())
}

/// Read a pending transaction saved by [`save_pending`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold a pending
/// transaction.
pub fn load_pending(path: &Path) -> Result<PendingTransaction, CliError> {
    let json = std::fs::read_to_string(path)?;
    Ok(PendingTransaction::from_json(&json)?)
}
