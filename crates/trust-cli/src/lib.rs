//! # trust-cli
//!
//! TrustChain command-line interface.
//!
//! Provides commands for:
//! - Submitting and upvoting product reviews
//! - Assembling and submitting externally signed transactions
//! - Listing reviews and reviewer reputation
//! - Decoding wallet balances
//!
//! # Architecture
//!
//! Commands drive a [`trust_ledger::ReviewLedger`] over the Blockfrost
//! HTTP API. Offline commands (`balance`, `product-id`, `assemble`,
//! `script-address`) never open a connection.
//!
//! ```text
//! ┌─────────────┐                 ┌───────────────┐     HTTPS     ┌────────────┐
//! │  trust-cli  │────────────────►│ trust-ledger  │──────────────►│ Blockfrost │
//! └─────────────┘                 └───────────────┘               └────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::OutputFormat;
