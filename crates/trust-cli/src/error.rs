//! CLI error types.

use thiserror::Error;
use trust_ledger::LedgerError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Hint printed after the error, if there is a known way forward.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Ledger(e) if e.is_spent_conflict() => Some(
                "the review was updated by another transaction; rebuild it against the current record",
            ),
            Self::Ledger(LedgerError::ScriptUnavailable { .. }) => {
                Some("set blueprint_path in the configuration to enable upvotes")
            }
            _ => None,
        }
    }
}
