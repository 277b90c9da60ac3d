//! Fixed-size digests and the hash functions the ledger uses.
//!
//! - [`Digest32`]: product ids and review content hashes (SHA-256)
//! - [`KeyHash`] / [`ScriptHash`]: BLAKE2b-224 of a verification key or script
//! - [`TxHash`]: BLAKE2b-256 of a transaction body
//!
//! All of them are hex strings in text and serde form.

use crate::error::{LedgerError, Result};
use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

type Blake2b224 = Blake2b<U28>;
type Blake2b256 = Blake2b<U32>;

/// BLAKE2b-224 of `data`.
#[must_use]
pub fn blake2b_224(data: &[u8]) -> [u8; 28] {
    Blake2b224::digest(data).into()
}

/// BLAKE2b-256 of `data`.
#[must_use]
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    Blake2b256::digest(data).into()
}

macro_rules! fixed_hash {
    ($(#[$meta:meta])* $name:ident, $len:expr, $label:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length in bytes.
            pub const LEN: usize = $len;

            /// Wrap raw bytes.
            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Build from a slice, checking the length.
            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let array: [u8; $len] = bytes.try_into().map_err(|_| {
                    LedgerError::validation(format!(
                        "{} must be {} bytes, got {}",
                        $label,
                        $len,
                        bytes.len()
                    ))
                })?;
                Ok(Self(array))
            }

            /// Parse from a hex string.
            pub fn from_hex(s: &str) -> Result<Self> {
                let bytes = hex::decode(s).map_err(|e| {
                    LedgerError::validation(format!("{} is not valid hex: {e}", $label))
                })?;
                Self::from_slice(&bytes)
            }

            /// Raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Lowercase hex form.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_hash!(
    /// A 32-byte digest (product id or review content hash).
    Digest32,
    32,
    "digest"
);

fixed_hash!(
    /// BLAKE2b-224 hash of an Ed25519 verification key.
    KeyHash,
    28,
    "key hash"
);

fixed_hash!(
    /// BLAKE2b-224 hash of a Plutus script.
    ScriptHash,
    28,
    "script hash"
);

fixed_hash!(
    /// Transaction id: BLAKE2b-256 of the transaction body.
    TxHash,
    32,
    "transaction hash"
);

impl KeyHash {
    /// Hash a 32-byte Ed25519 verification key.
    #[must_use]
    pub fn of_vkey(vkey: &[u8; 32]) -> Self {
        Self(blake2b_224(vkey))
    }
}

impl ScriptHash {
    /// Language prefix for PlutusV3 scripts.
    pub const PLUTUS_V3_PREFIX: u8 = 0x03;

    /// Hash a PlutusV3 script.
    #[must_use]
    pub fn of_plutus_v3(script: &[u8]) -> Self {
        let mut tagged = Vec::with_capacity(script.len() + 1);
        tagged.push(Self::PLUTUS_V3_PREFIX);
        tagged.extend_from_slice(script);
        Self(blake2b_224(&tagged))
    }
}

impl TxHash {
    /// Hash transaction body bytes.
    #[must_use]
    pub fn of_body(body: &[u8]) -> Self {
        Self(blake2b_256(body))
    }
}

/// Product id for a catalog SKU: SHA-256 of the SKU.
#[must_use]
pub fn product_id_for_sku(sku: &str) -> Digest32 {
    Digest32(Sha256::digest(sku.as_bytes()).into())
}

/// Commitment to review content: SHA-256 of `"{product_id}:{rating}:{text}"`,
/// with the product id in hex.
#[must_use]
pub fn review_content_hash(product_id: &Digest32, rating: u8, text: &str) -> Digest32 {
    let content = format!("{product_id}:{rating}:{text}");
    Digest32(Sha256::digest(content.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_is_sha256_of_sku() {
        // sha256("abc")
        assert_eq!(
            product_id_for_sku("abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_review_hash_depends_on_every_part() {
        let product = product_id_for_sku("SKU-1");
        let base = review_content_hash(&product, 5, "great");
        assert_ne!(base, review_content_hash(&product, 4, "great"));
        assert_ne!(base, review_content_hash(&product, 5, "good"));
        assert_ne!(base, review_content_hash(&product_id_for_sku("SKU-2"), 5, "great"));
        assert_eq!(base, review_content_hash(&product, 5, "great"));
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Digest32::from_hex("abcd").is_err());
        assert!(Digest32::from_hex(&"zz".repeat(32)).is_err());
        assert!(Digest32::from_hex(&"ab".repeat(32)).is_ok());
        assert!(KeyHash::from_hex(&"ab".repeat(32)).is_err());
    }

    #[test]
    fn test_blake2b_lengths() {
        // Known answer: BLAKE2b-256 of the empty string.
        assert_eq!(
            hex::encode(blake2b_256(b"")),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
        assert_eq!(blake2b_224(b"").len(), 28);
    }

    #[test]
    fn test_script_hash_uses_language_prefix() {
        let script = [0x01, 0x02, 0x03];
        assert_ne!(
            ScriptHash::of_plutus_v3(&script).as_bytes(),
            &blake2b_224(&script)
        );
    }

    #[test]
    fn test_serde_as_hex() {
        let hash = KeyHash::new([7u8; 28]);
        let json = serde_json::to_string(&hash).expect("serialize");
        assert_eq!(json, format!("\"{}\"", "07".repeat(28)));
        let parsed: KeyHash = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, hash);
    }
}
