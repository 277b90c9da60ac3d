//! # trust-ledger
//!
//! On-chain review ledger for TrustChain.
//!
//! Reviews live as UTXOs locked at a validator script address, each carrying
//! an inline [`ReviewDatum`]. A record is never changed in place: an upvote
//! spends the current output and recreates it with one more upvote.
//!
//! This crate provides:
//! - The datum codec matching the validator's on-chain layout
//! - Transaction building for review submission and upvoting
//! - Assembly of unsigned transactions with externally produced witnesses
//! - The Built → Signed → Assembled → Submitted pipeline
//! - Indexing of review records and reputation scoring
//! - A best-effort CBOR balance decoder for wallet display
//! - Ledger providers: Blockfrost over HTTP and an in-memory ledger
//!
//! ## Amounts
//!
//! - **Unit**: lovelace (`1 ADA = 1_000_000` lovelace)
//! - **Locked per review**: 2 ADA
//!
//! ## Example
//!
//! ```rust,no_run
//! use trust_ledger::{
//!     BlockfrostProvider, KeyWallet, LedgerConfig, PendingTransaction, ReviewLedger,
//!     product_id_for_sku, review_content_hash,
//! };
//!
//! # async fn example() -> trust_ledger::Result<()> {
//! let mut config = LedgerConfig::from_file("trustchain.json")?;
//! config.apply_env()?;
//! let ledger = ReviewLedger::from_config(BlockfrostProvider::from_config(&config)?, config)?;
//!
//! let wallet = KeyWallet::from_file("payment.skey")?;
//! let product = product_id_for_sku("SKU-1001");
//! let unsigned = ledger
//!     .build_submission(
//!         &wallet.address(ledger.network()),
//!         wallet.key_hash(),
//!         product,
//!         5,
//!         review_content_hash(&product, 5, "Works as described"),
//!     )
//!     .await?;
//!
//! let mut pending = PendingTransaction::new(unsigned);
//! pending.sign_with(&wallet).await?;
//! pending.assemble()?;
//! let tx_hash = pending.submit(ledger.provider()).await?;
//! println!("Submitted: {tx_hash}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod amount;
pub mod assembler;
pub mod balance;
pub mod blockfrost;
pub mod builder;
pub mod cbor;
pub mod client;
pub mod config;
pub mod datum;
pub mod digest;
pub mod error;
pub mod indexer;
pub mod memory;
pub mod pipeline;
pub mod plutus;
pub mod provider;
pub mod reputation;
pub mod script;
pub mod selection;
pub mod transaction;
pub mod utxo;
pub mod wallet;

pub use address::{Address, Network};
pub use amount::Lovelace;
pub use assembler::{AssemblyInput, assemble};
pub use balance::{decode_balance, decode_balance_hex};
pub use blockfrost::BlockfrostProvider;
pub use builder::TransactionBuilder;
pub use client::ReviewLedger;
pub use config::{LedgerConfig, ProtocolParams};
pub use datum::{ReviewAction, ReviewDatum, ReviewKey};
pub use digest::{Digest32, KeyHash, ScriptHash, TxHash, product_id_for_sku, review_content_hash};
pub use error::{LedgerError, Result};
pub use indexer::ReviewIndex;
pub use memory::InMemoryLedger;
pub use pipeline::{PendingTransaction, PipelineStage};
pub use provider::{LedgerProvider, Signer, TransactionInfo};
pub use reputation::reputation_score;
pub use script::ValidatorScript;
pub use transaction::{SignedTransaction, UnsignedTransaction, WitnessSet};
pub use utxo::{OutputRef, ReviewUtxo, Utxo, Value};
pub use wallet::KeyWallet;

/// One ADA in lovelace.
pub const LOVELACE_PER_ADA: u64 = 1_000_000;

/// Value locked with each review output, in lovelace.
pub const SCRIPT_LOCKED_LOVELACE: u64 = 2_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(LOVELACE_PER_ADA, 1_000_000);
        assert_eq!(SCRIPT_LOCKED_LOVELACE, 2 * LOVELACE_PER_ADA);
    }
}
