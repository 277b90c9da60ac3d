//! Review index over the UTXOs locked at the script address.
//!
//! The script address may hold outputs this crate did not create: records
//! from another script version, stray payments, garbage datums. Those are
//! skipped during the scan and counted, never fatal.

use crate::address::Address;
use crate::datum::{ReviewDatum, ReviewKey};
use crate::digest::{Digest32, KeyHash};
use crate::error::Result;
use crate::provider::LedgerProvider;
use crate::utxo::{OutputRef, ReviewUtxo, Utxo};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Decoded review records at one point in time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewIndex {
    reviews: Vec<ReviewUtxo>,
    skipped: usize,
}

impl ReviewIndex {
    /// Decode `utxos`, keeping every output that carries a review datum.
    #[must_use]
    pub fn from_utxos(utxos: &[Utxo]) -> Self {
        let mut index = Self::default();
        for utxo in utxos {
            let Some(bytes) = utxo.inline_datum.as_deref() else {
                debug!(out_ref = %utxo.out_ref, "skipping output without inline datum");
                index.skipped += 1;
                continue;
            };
            match ReviewDatum::from_cbor(bytes) {
                Ok(datum) => index.reviews.push(ReviewUtxo {
                    out_ref: utxo.out_ref,
                    value: utxo.value.clone(),
                    datum,
                }),
                Err(e) => {
                    warn!(out_ref = %utxo.out_ref, error = %e, "skipping undecodable datum");
                    index.skipped += 1;
                }
            }
        }
        index
    }

    /// Fetch and decode everything at `script_address`.
    ///
    /// # Errors
    ///
    /// Propagates provider failures; individual records never fail the scan.
    pub async fn scan<P: LedgerProvider>(provider: &P, script_address: &Address) -> Result<Self> {
        let utxos = provider.fetch_utxos(script_address).await?;
        let index = Self::from_utxos(&utxos);
        info!(
            address = %script_address,
            reviews = index.reviews.len(),
            skipped = index.skipped,
            "scanned review address"
        );
        Ok(index)
    }

    /// All decoded records.
    #[must_use]
    pub fn reviews(&self) -> &[ReviewUtxo] {
        &self.reviews
    }

    /// Consume the index.
    #[must_use]
    pub fn into_reviews(self) -> Vec<ReviewUtxo> {
        self.reviews
    }

    /// Outputs that were not review records.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of decoded records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    /// True if no records decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    /// Records for a product.
    #[must_use]
    pub fn by_product(&self, product_id: &Digest32) -> Vec<&ReviewUtxo> {
        self.reviews
            .iter()
            .filter(|r| &r.datum.product_id == product_id)
            .collect()
    }

    /// Records by a reviewer.
    #[must_use]
    pub fn by_reviewer(&self, reviewer: &KeyHash) -> Vec<&ReviewUtxo> {
        self.reviews
            .iter()
            .filter(|r| &r.datum.reviewer == reviewer)
            .collect()
    }

    /// The record at an output reference.
    #[must_use]
    pub fn find(&self, out_ref: &OutputRef) -> Option<&ReviewUtxo> {
        self.reviews.iter().find(|r| &r.out_ref == out_ref)
    }

    /// The most advanced live generation of a logical review.
    #[must_use]
    pub fn latest(&self, key: &ReviewKey) -> Option<&ReviewUtxo> {
        self.reviews
            .iter()
            .filter(|r| &r.key() == key)
            .max_by_key(|r| (r.datum.upvotes, r.datum.flags))
    }
}
