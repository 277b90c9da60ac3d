//! Review datum codec.
//!
//! The review validator expects its inline datum as constructor 0 with exactly
//! eight fields, in this order:
//!
//! | # | field         | encoding                  |
//! |---|---------------|---------------------------|
//! | 0 | `product_id`  | bytes (32)                |
//! | 1 | `rating`      | int, 1..=5                |
//! | 2 | `review_hash` | bytes (32)                |
//! | 3 | `reviewer`    | bytes (28, key hash)      |
//! | 4 | `timestamp`   | int, unix seconds         |
//! | 5 | `upvotes`     | int, >= 0                 |
//! | 6 | `flags`       | int, >= 0                 |
//! | 7 | `verified`    | int, 0 or 1               |
//!
//! Any change to this layout desynchronizes every record already on chain.

use crate::digest::{Digest32, KeyHash};
use crate::error::{LedgerError, Result};
use crate::plutus::PlutusData;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Constructor alternative of the review datum.
pub const REVIEW_DATUM_ALTERNATIVE: u64 = 0;

/// Number of fields in the review datum.
pub const REVIEW_DATUM_FIELDS: usize = 8;

/// Constructor alternative of the upvote action in the validator's redeemer type.
pub const UPVOTE_ACTION_ALTERNATIVE: u64 = 0;

/// Allowed star ratings.
pub const RATING_RANGE: RangeInclusive<u8> = 1..=5;

/// One review record as stored in a script-locked UTXO.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewDatum {
    /// Product the review is about.
    pub product_id: Digest32,
    /// Star rating, 1 to 5.
    pub rating: u8,
    /// Commitment to the off-chain review content.
    pub review_hash: Digest32,
    /// Key hash of the reviewer.
    pub reviewer: KeyHash,
    /// Submission time, unix seconds.
    pub timestamp: u64,
    /// Upvote count.
    pub upvotes: u64,
    /// Flag count.
    pub flags: u64,
    /// Whether the review is marked verified.
    pub verified: bool,
}

impl ReviewDatum {
    /// Create a freshly submitted review with zero upvotes and flags.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the rating is outside 1..=5.
    pub fn new(
        product_id: Digest32,
        rating: u8,
        review_hash: Digest32,
        reviewer: KeyHash,
        timestamp: u64,
    ) -> Result<Self> {
        if !RATING_RANGE.contains(&rating) {
            return Err(LedgerError::validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }
        Ok(Self {
            product_id,
            rating,
            review_hash,
            reviewer,
            timestamp,
            upvotes: 0,
            flags: 0,
            verified: false,
        })
    }

    /// The replacement record for an upvote: identical except `upvotes + 1`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the counter would overflow.
    pub fn with_upvote(&self) -> Result<Self> {
        let upvotes = self
            .upvotes
            .checked_add(1)
            .ok_or_else(|| LedgerError::validation("upvote counter overflow"))?;
        Ok(Self {
            upvotes,
            ..self.clone()
        })
    }

    /// Identity of the logical review, stable across generations.
    #[must_use]
    pub fn key(&self) -> ReviewKey {
        ReviewKey {
            product_id: self.product_id,
            reviewer: self.reviewer,
            review_hash: self.review_hash,
            timestamp: self.timestamp,
        }
    }

    /// Plutus data form.
    #[must_use]
    pub fn to_plutus(&self) -> PlutusData {
        PlutusData::constr(
            REVIEW_DATUM_ALTERNATIVE,
            vec![
                PlutusData::Bytes(self.product_id.as_bytes().to_vec()),
                PlutusData::Int(i128::from(self.rating)),
                PlutusData::Bytes(self.review_hash.as_bytes().to_vec()),
                PlutusData::Bytes(self.reviewer.as_bytes().to_vec()),
                PlutusData::Int(i128::from(self.timestamp)),
                PlutusData::Int(i128::from(self.upvotes)),
                PlutusData::Int(i128::from(self.flags)),
                PlutusData::Int(i128::from(u8::from(self.verified))),
            ],
        )
    }

    /// Encode to the on-chain binary form.
    #[must_use]
    pub fn to_cbor(&self) -> Vec<u8> {
        self.to_plutus().to_cbor()
    }

    /// Interpret Plutus data as a review datum.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDatum` if the alternative is not 0, the field count is
    /// not 8, or any field has the wrong type or range.
    pub fn from_plutus(data: &PlutusData) -> Result<Self> {
        let PlutusData::Constr {
            alternative,
            fields,
        } = data
        else {
            return Err(LedgerError::invalid_datum("datum is not a constructor"));
        };
        if *alternative != REVIEW_DATUM_ALTERNATIVE {
            return Err(LedgerError::invalid_datum(format!(
                "expected constructor {REVIEW_DATUM_ALTERNATIVE}, got {alternative}"
            )));
        }
        if fields.len() != REVIEW_DATUM_FIELDS {
            return Err(LedgerError::invalid_datum(format!(
                "expected {REVIEW_DATUM_FIELDS} fields, got {}",
                fields.len()
            )));
        }

        let rating = int_field(&fields[1], "rating")?;
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| RATING_RANGE.contains(r))
            .ok_or_else(|| LedgerError::invalid_datum(format!("rating {rating} out of range")))?;
        let verified = match int_field(&fields[7], "verified")? {
            0 => false,
            1 => true,
            other => {
                return Err(LedgerError::invalid_datum(format!(
                    "verified must be 0 or 1, got {other}"
                )));
            }
        };

        Ok(Self {
            product_id: digest_field(&fields[0], "product_id")?,
            rating,
            review_hash: digest_field(&fields[2], "review_hash")?,
            reviewer: KeyHash::from_slice(bytes_field(&fields[3], "reviewer")?)
                .map_err(|e| LedgerError::invalid_datum(format!("reviewer: {e}")))?,
            timestamp: int_field(&fields[4], "timestamp")?,
            upvotes: int_field(&fields[5], "upvotes")?,
            flags: int_field(&fields[6], "flags")?,
            verified,
        })
    }

    /// Decode the on-chain binary form.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDatum` for malformed CBOR or a layout mismatch.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let data = PlutusData::from_cbor(bytes)
            .map_err(|e| LedgerError::invalid_datum(e.to_string()))?;
        Self::from_plutus(&data)
    }
}

fn bytes_field<'a>(field: &'a PlutusData, name: &str) -> Result<&'a [u8]> {
    match field {
        PlutusData::Bytes(bytes) => Ok(bytes),
        _ => Err(LedgerError::invalid_datum(format!("{name} must be bytes"))),
    }
}

fn digest_field(field: &PlutusData, name: &str) -> Result<Digest32> {
    Digest32::from_slice(bytes_field(field, name)?)
        .map_err(|e| LedgerError::invalid_datum(format!("{name}: {e}")))
}

fn int_field(field: &PlutusData, name: &str) -> Result<u64> {
    match field {
        PlutusData::Int(value) => u64::try_from(*value).map_err(|_| {
            LedgerError::invalid_datum(format!("{name} out of range: {value}"))
        }),
        _ => Err(LedgerError::invalid_datum(format!("{name} must be an integer"))),
    }
}

/// Identity of a logical review across its UTXO generations.
///
/// Upvotes replace the UTXO but never touch these fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewKey {
    /// Product reviewed.
    pub product_id: Digest32,
    /// Reviewer key hash.
    pub reviewer: KeyHash,
    /// Review content commitment.
    pub review_hash: Digest32,
    /// Original submission time.
    pub timestamp: u64,
}

/// Spend actions understood by the review validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    /// Add one upvote, signed by the voter.
    Upvote {
        /// Key hash of the voter.
        voter: KeyHash,
    },
}

impl ReviewAction {
    /// Plutus data form used as the redeemer.
    #[must_use]
    pub fn to_plutus(&self) -> PlutusData {
        match self {
            Self::Upvote { voter } => PlutusData::constr(
                UPVOTE_ACTION_ALTERNATIVE,
                vec![PlutusData::Bytes(voter.as_bytes().to_vec())],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn sample() -> ReviewDatum {
        ReviewDatum {
            product_id: Digest32::new([0x11; 32]),
            rating: 4,
            review_hash: Digest32::new([0x22; 32]),
            reviewer: KeyHash::new([0x33; 28]),
            timestamp: 1_735_689_600,
            upvotes: 3,
            flags: 0,
            verified: true,
        }
    }

    fn with_field(index: usize, value: PlutusData) -> Vec<u8> {
        let PlutusData::Constr { fields, .. } = sample().to_plutus() else {
            unreachable!("review datum is a constructor")
        };
        let mut fields = fields;
        fields[index] = value;
        PlutusData::constr(0, fields).to_cbor()
    }

    #[test]
    fn test_encoding_layout() {
        let bytes = sample().to_cbor();
        // tag 121, indefinite list
        assert_eq!(&bytes[..3], &[0xd8, 0x79, 0x9f]);
        // product_id as a 32-byte string
        assert_eq!(&bytes[3..5], &[0x58, 0x20]);
        assert_eq!(&bytes[5..37], &[0x11; 32]);
        // rating
        assert_eq!(bytes[37], 0x04);
        assert_eq!(*bytes.last().expect("non-empty"), 0xff);
    }

    #[test]
    fn test_roundtrip_sample() {
        let datum = sample();
        assert_eq!(ReviewDatum::from_cbor(&datum.to_cbor()).expect("decode"), datum);
    }

    #[test]
    fn test_rejects_wrong_alternative() {
        let PlutusData::Constr { fields, .. } = sample().to_plutus() else {
            unreachable!("review datum is a constructor")
        };
        let bytes = PlutusData::constr(1, fields).to_cbor();
        let err = ReviewDatum::from_cbor(&bytes).expect_err("alternative 1");
        assert!(matches!(err, LedgerError::InvalidDatum { .. }));
    }

    #[test]
    fn test_rejects_wrong_field_count() {
        let PlutusData::Constr { mut fields, .. } = sample().to_plutus() else {
            unreachable!("review datum is a constructor")
        };
        fields.pop();
        let bytes = PlutusData::constr(0, fields).to_cbor();
        assert!(matches!(
            ReviewDatum::from_cbor(&bytes),
            Err(LedgerError::InvalidDatum { .. })
        ));
    }

    #[test_case(1, PlutusData::Int(0) ; "rating zero")]
    #[test_case(1, PlutusData::Int(6) ; "rating six")]
    #[test_case(5, PlutusData::Int(-1) ; "negative upvotes")]
    #[test_case(6, PlutusData::Int(-3) ; "negative flags")]
    #[test_case(4, PlutusData::Int(i128::from(u64::MAX) + 1) ; "timestamp too large")]
    #[test_case(7, PlutusData::Int(2) ; "verified not boolean")]
    #[test_case(0, PlutusData::Bytes(vec![1; 31]) ; "short product id")]
    #[test_case(2, PlutusData::Int(1) ; "review hash not bytes")]
    #[test_case(3, PlutusData::Bytes(vec![1; 32]) ; "reviewer wrong length")]
    fn test_rejects_bad_field(index: usize, value: PlutusData) {
        let err = ReviewDatum::from_cbor(&with_field(index, value)).expect_err("invalid");
        assert!(matches!(err, LedgerError::InvalidDatum { .. }));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            ReviewDatum::from_cbor(&[0xde, 0xad]),
            Err(LedgerError::InvalidDatum { .. })
        ));
        // JSON-as-datum, which older clients wrote.
        assert!(ReviewDatum::from_cbor(br#"{"rating":5}"#).is_err());
    }

    #[test_case(0 ; "below range")]
    #[test_case(6 ; "above range")]
    fn test_new_rejects_rating(rating: u8) {
        let err = ReviewDatum::new(
            Digest32::new([0; 32]),
            rating,
            Digest32::new([0; 32]),
            KeyHash::new([0; 28]),
            0,
        )
        .expect_err("out of range");
        assert!(matches!(err, LedgerError::Validation { .. }));
    }

    #[test]
    fn test_with_upvote_only_changes_upvotes() {
        let datum = sample();
        let next = datum.with_upvote().expect("upvote");
        assert_eq!(next.upvotes, datum.upvotes + 1);
        assert_eq!(next.key(), datum.key());
        assert_eq!(next.rating, datum.rating);
        assert_eq!(next.flags, datum.flags);
        assert_eq!(next.verified, datum.verified);
    }

    #[test]
    fn test_upvote_redeemer_layout() {
        let action = ReviewAction::Upvote {
            voter: KeyHash::new([0xaa; 28]),
        };
        let bytes = action.to_plutus().to_cbor();
        assert_eq!(&bytes[..5], &[0xd8, 0x79, 0x9f, 0x58, 0x1c]);
    }

    fn arb_datum() -> impl Strategy<Value = ReviewDatum> {
        (
            any::<[u8; 32]>(),
            1u8..=5,
            any::<[u8; 32]>(),
            any::<[u8; 28]>(),
            any::<u64>(),
            any::<u64>(),
            any::<u64>(),
            any::<bool>(),
        )
            .prop_map(
                |(product, rating, review, reviewer, timestamp, upvotes, flags, verified)| {
                    ReviewDatum {
                        product_id: Digest32::new(product),
                        rating,
                        review_hash: Digest32::new(review),
                        reviewer: KeyHash::new(reviewer),
                        timestamp,
                        upvotes,
                        flags,
                        verified,
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(datum in arb_datum()) {
            let decoded = ReviewDatum::from_cbor(&datum.to_cbor()).expect("decode");
            prop_assert_eq!(decoded, datum);
        }
    }
}
