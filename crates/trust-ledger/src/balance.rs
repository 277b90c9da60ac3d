//! Wallet balance decoding for display.
//!
//! CIP-30 wallets report their balance as a CBOR value: a bare coin amount,
//! or a two-element array of the coin amount and a multi-asset map. This is
//! a best-effort display decoder, not a general parser: it reads the coin
//! amount only, ignores the asset map, and yields zero for anything it does
//! not recognise.

use crate::amount::Lovelace;
use crate::cbor::{CborResult, Decoder, Kind};
use tracing::debug;

/// Decode a hex-encoded balance. Returns zero for malformed input.
#[must_use]
pub fn decode_balance_hex(hex_balance: &str) -> Lovelace {
    match hex::decode(hex_balance.trim()) {
        Ok(bytes) => decode_balance(&bytes),
        Err(e) => {
            debug!(error = %e, "balance is not valid hex");
            Lovelace::ZERO
        }
    }
}

/// Decode a CBOR balance. Returns zero for malformed input.
#[must_use]
pub fn decode_balance(bytes: &[u8]) -> Lovelace {
    match read_coin(bytes) {
        Ok(Some(coin)) => Lovelace::new(coin),
        Ok(None) => {
            debug!("balance array is not [coin, assets]");
            Lovelace::ZERO
        }
        Err(e) => {
            debug!(error = %e, "unrecognized balance encoding");
            Lovelace::ZERO
        }
    }
}

/// Coin amount of a bare uint or a `[coin, assets]` pair.
fn read_coin(bytes: &[u8]) -> CborResult<Option<u64>> {
    let mut dec = Decoder::new(bytes);
    if dec.kind()? == Kind::Array && dec.array()? != Some(2) {
        return Ok(None);
    }
    dec.uint().map(Some)
}
