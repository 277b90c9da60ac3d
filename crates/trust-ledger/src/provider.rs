//! External collaborators: the ledger-data provider and the signer.
//!
//! Both are capability traits so the core never depends on one provider's
//! API shape. Calls may block for an unbounded time; timeouts and
//! cancellation belong to the caller.

use crate::address::Address;
use crate::amount::Lovelace;
use crate::digest::TxHash;
use crate::error::Result;
use crate::transaction::{SignedTransaction, UnsignedTransaction, WitnessSet};
use crate::utxo::Utxo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Details of a transaction known to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// Transaction id.
    pub hash: TxHash,
    /// Hash of the including block, once confirmed.
    pub block: Option<String>,
    /// Height of the including block.
    pub block_height: Option<u64>,
    /// Unix time of the including block.
    pub block_time: Option<i64>,
    /// Slot of the including block.
    pub slot: Option<u64>,
    /// Fee paid.
    pub fees: Lovelace,
    /// Serialized size in bytes.
    pub size: u64,
    /// Whether scripts passed phase-two validation.
    pub valid_contract: bool,
}

impl TransactionInfo {
    /// True once the transaction is in a block.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        self.block_height.is_some()
    }

    /// Block time as a timestamp.
    #[must_use]
    pub fn block_datetime(&self) -> Option<DateTime<Utc>> {
        self.block_time
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}

/// Source of ledger state and sink for finalized transactions.
pub trait LedgerProvider: Send + Sync {
    /// Fetch every UTXO currently at `address`.
    fn fetch_utxos(&self, address: &Address) -> impl Future<Output = Result<Vec<Utxo>>> + Send;

    /// Fetch details of a transaction by hash.
    fn fetch_transaction(
        &self,
        tx_hash: &TxHash,
    ) -> impl Future<Output = Result<TransactionInfo>> + Send;

    /// Submit a finalized transaction. One attempt, no retry.
    ///
    /// A transaction spending an already consumed output fails with a
    /// rejection whose `conflict` flag is set.
    fn submit_transaction(
        &self,
        tx: &SignedTransaction,
    ) -> impl Future<Output = Result<TxHash>> + Send;
}

/// Produces signatures for an unsigned transaction.
pub trait Signer: Send + Sync {
    /// Sign `tx`, returning witnesses for the keys this signer holds.
    fn sign(&self, tx: &UnsignedTransaction) -> impl Future<Output = Result<WitnessSet>> + Send;
}
