//! Coin selection.
//!
//! Sequential accumulation: wallet UTXOs are taken in provider order until
//! the target is covered. Outputs holding native assets or a datum are never
//! spent, so the change output is always pure ADA.

use crate::amount::Lovelace;
use crate::error::{LedgerError, Result};
use crate::utxo::{OutputRef, Utxo};
use tracing::debug;

/// Result of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Chosen inputs, in selection order.
    pub inputs: Vec<Utxo>,
    /// Sum of the inputs.
    pub total: Lovelace,
    /// `total - target`; zero or at least the minimum change.
    pub change: Lovelace,
}

/// Select inputs covering `target`.
///
/// Stops at the first prefix whose surplus is zero or at least
/// `min_change`. Outputs listed in `exclude` are skipped.
pub fn select_sequential(
    utxos: &[Utxo],
    target: Lovelace,
    min_change: Lovelace,
    exclude: &[OutputRef],
) -> Result<Selection> {
    let mut inputs = Vec::new();
    let mut total = Lovelace::ZERO;
    for utxo in utxos
        .iter()
        .filter(|u| u.is_plain() && !exclude.contains(&u.out_ref))
    {
        inputs.push(utxo.clone());
        total = total.saturating_add(utxo.value.coin);
        if let Some(change) = total.checked_sub(target) {
            if change.is_zero() || change >= min_change {
                debug!(
                    inputs = inputs.len(),
                    total = %total,
                    change = %change,
                    "selection covered target"
                );
                return Ok(Selection {
                    inputs,
                    total,
                    change,
                });
            }
        }
    }
    let need = if total >= target {
        target.saturating_add(min_change)
    } else {
        target
    };
    Err(LedgerError::insufficient_funds(
        total.lovelace(),
        need.lovelace(),
    ))
}

/// Pick one pure-ADA UTXO holding at least `required` as collateral.
pub fn select_collateral(utxos: &[Utxo], required: Lovelace) -> Result<Utxo> {
    utxos
        .iter()
        .find(|u| u.is_plain() && u.value.coin >= required)
        .cloned()
        .ok_or_else(|| {
            let best = utxos
                .iter()
                .filter(|u| u.is_plain())
                .map(|u| u.value.coin.lovelace())
                .max()
                .unwrap_or(0);
            LedgerError::insufficient_funds(best, required.lovelace())
        })
}
