//! Reviewer reputation computed from live review records.
//!
//! The score is recomputed from ledger state on every call. Records come
//! from the chain and are untrusted, so the arithmetic is done in `i128`
//! and the total is clamped into `0..=u64::MAX`.

use crate::address::Address;
use crate::datum::ReviewDatum;
use crate::digest::KeyHash;
use crate::indexer::ReviewIndex;
use crate::provider::LedgerProvider;
use tracing::{debug, warn};

/// Points per upvote.
pub const UPVOTE_POINTS: i128 = 10;

/// Points for a verified review.
pub const VERIFIED_POINTS: i128 = 50;

/// Points lost per flag.
pub const FLAG_PENALTY: i128 = 20;

/// Contribution of a single record, before clamping.
#[must_use]
pub fn record_points(datum: &ReviewDatum) -> i128 {
    let verified = if datum.verified { VERIFIED_POINTS } else { 0 };
    i128::from(datum.upvotes) * UPVOTE_POINTS + verified - i128::from(datum.flags) * FLAG_PENALTY
}

/// Total score of a set of records. Never negative.
#[must_use]
pub fn reputation_score<'a>(records: impl IntoIterator<Item = &'a ReviewDatum>) -> u64 {
    let total = records
        .into_iter()
        .fold(0i128, |acc, datum| acc.saturating_add(record_points(datum)));
    u64::try_from(total.max(0)).unwrap_or(u64::MAX)
}

/// Score of `reviewer` over an already scanned index.
#[must_use]
pub fn reviewer_score(index: &ReviewIndex, reviewer: &KeyHash) -> u64 {
    reputation_score(index.by_reviewer(reviewer).into_iter().map(|r| &r.datum))
}

/// Score of `reviewer` from current ledger state.
///
/// An unreachable provider yields 0 rather than an error.
pub async fn fetch_reputation<P: LedgerProvider>(
    provider: &P,
    script_address: &Address,
    reviewer: &KeyHash,
) -> u64 {
    match ReviewIndex::scan(provider, script_address).await {
        Ok(index) => {
            let score = reviewer_score(&index, reviewer);
            debug!(reviewer = %reviewer, score, "computed reputation");
            score
        }
        Err(e) => {
            warn!(reviewer = %reviewer, error = %e, "reputation unavailable, reporting 0");
            0
        }
    }
}
