//! Error types for review ledger operations.

use thiserror::Error;

/// Result type alias for review ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while building, assembling, submitting or reading
/// review transactions.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Caller input violates a declared invariant.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the violated invariant.
        message: String,
    },

    /// Wallet UTXOs cannot cover the value the transaction needs.
    #[error("insufficient funds: have {have} lovelace, need {need} lovelace")]
    InsufficientFunds {
        /// Lovelace available to selection.
        have: u64,
        /// Lovelace required.
        need: u64,
    },

    /// Transaction could not be constructed.
    #[error("builder error: {message}")]
    Builder {
        /// Description of the builder failure.
        message: String,
    },

    /// The compiled validator program is not loaded.
    #[error("validator script unavailable: {message}")]
    ScriptUnavailable {
        /// Why the script is missing.
        message: String,
    },

    /// A UTXO is missing something the operation depends on.
    #[error("UTXO error: {message}")]
    Utxo {
        /// Description of the UTXO problem.
        message: String,
    },

    /// Witness set and unsigned transaction do not fit together.
    #[error("assembly error: {message}")]
    Assembly {
        /// Description of the mismatch.
        message: String,
    },

    /// On-chain binary does not match the review datum layout.
    #[error("invalid datum: {message}")]
    InvalidDatum {
        /// Description of the decoding failure.
        message: String,
    },

    /// An external dependency could not be reached.
    #[error("provider unavailable: {message}")]
    ProviderUnavailable {
        /// Description of the provider failure.
        message: String,
    },

    /// The ledger refused a submitted transaction.
    #[error("transaction rejected: {reason}")]
    Rejected {
        /// Rejection reason reported by the ledger.
        reason: String,
        /// Whether an input was already spent by another transaction.
        conflict: bool,
    },

    /// The provider has no record of the requested item.
    #[error("not found: {message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },

    /// Invalid address format.
    #[error("invalid address: {message}")]
    InvalidAddress {
        /// Description of the address error.
        message: String,
    },

    /// Pipeline step attempted from the wrong stage.
    #[error("invalid transition: cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current stage.
        from: String,
        /// Requested stage.
        to: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an insufficient funds error.
    #[must_use]
    pub fn insufficient_funds(have: u64, need: u64) -> Self {
        Self::InsufficientFunds { have, need }
    }

    /// Create a builder error.
    #[must_use]
    pub fn builder(message: impl Into<String>) -> Self {
        Self::Builder {
            message: message.into(),
        }
    }

    /// Create a script unavailable error.
    #[must_use]
    pub fn script_unavailable(message: impl Into<String>) -> Self {
        Self::ScriptUnavailable {
            message: message.into(),
        }
    }

    /// Create a UTXO error.
    #[must_use]
    pub fn utxo(message: impl Into<String>) -> Self {
        Self::Utxo {
            message: message.into(),
        }
    }

    /// Create an assembly error.
    #[must_use]
    pub fn assembly(message: impl Into<String>) -> Self {
        Self::Assembly {
            message: message.into(),
        }
    }

    /// Create an invalid datum error.
    #[must_use]
    pub fn invalid_datum(message: impl Into<String>) -> Self {
        Self::InvalidDatum {
            message: message.into(),
        }
    }

    /// Create a provider unavailable error.
    #[must_use]
    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            message: message.into(),
        }
    }

    /// Create a rejection error.
    #[must_use]
    pub fn rejected(reason: impl Into<String>, conflict: bool) -> Self {
        Self::Rejected {
            reason: reason.into(),
            conflict,
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an invalid address error.
    #[must_use]
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True when the ledger rejected a transaction because one of its inputs
    /// was already consumed. The caller should re-query and rebuild.
    #[must_use]
    pub const fn is_spent_conflict(&self) -> bool {
        matches!(self, Self::Rejected { conflict: true, .. })
    }
}
