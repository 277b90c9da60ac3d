//! Plutus data: the structured value type validator programs consume.
//!
//! Encoding follows the ledger's conventions so that bytes produced here are
//! identical to what other Cardano tooling produces for the same value:
//! constructor alternatives 0–6 use tags 121–127, 7–127 use tags 1280–1400
//! and anything larger uses tag 102; non-empty lists are indefinite-length;
//! byte strings longer than 64 bytes are split into 64-byte chunks; integers
//! outside the 64-bit range use bignum tags 2 and 3.

use crate::cbor::{CborError, CborResult, Decoder, Encoder, Kind};

const BYTES_CHUNK: usize = 64;
const TAG_POS_BIGNUM: u64 = 2;
const TAG_NEG_BIGNUM: u64 = 3;
const TAG_CONSTR_GENERAL: u64 = 102;
const TAG_CONSTR_SMALL: u64 = 121;
const TAG_CONSTR_LARGE: u64 = 1280;

/// Limit on nested data during decoding.
const MAX_DEPTH: usize = 32;

/// A Plutus data value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlutusData {
    /// Constructor application: alternative index plus fields.
    Constr {
        /// Constructor alternative.
        alternative: u64,
        /// Field values in declaration order.
        fields: Vec<PlutusData>,
    },
    /// Key/value pairs.
    Map(Vec<(PlutusData, PlutusData)>),
    /// List of values.
    List(Vec<PlutusData>),
    /// Arbitrary precision integer, bounded here to i128.
    Int(i128),
    /// Byte string.
    Bytes(Vec<u8>),
}

impl PlutusData {
    /// Shorthand for a constructor.
    #[must_use]
    pub fn constr(alternative: u64, fields: Vec<PlutusData>) -> Self {
        Self::Constr {
            alternative,
            fields,
        }
    }

    /// Encode to CBOR bytes.
    #[must_use]
    pub fn to_cbor(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.encode(&mut enc);
        enc.into_bytes()
    }

    /// Decode from CBOR bytes, requiring the whole buffer to be one value.
    pub fn from_cbor(bytes: &[u8]) -> CborResult<Self> {
        let mut dec = Decoder::new(bytes);
        let data = Self::decode(&mut dec)?;
        dec.finish()?;
        Ok(data)
    }

    /// Write this value into an encoder.
    pub fn encode(&self, enc: &mut Encoder) {
        match self {
            Self::Constr {
                alternative,
                fields,
            } => {
                match *alternative {
                    0..=6 => {
                        enc.tag(TAG_CONSTR_SMALL + alternative);
                    }
                    7..=127 => {
                        enc.tag(TAG_CONSTR_LARGE + alternative - 7);
                    }
                    _ => {
                        enc.tag(TAG_CONSTR_GENERAL).array(2).uint(*alternative);
                    }
                }
                encode_list(enc, fields);
            }
            Self::Map(entries) => {
                enc.map(entries.len() as u64);
                for (key, value) in entries {
                    key.encode(enc);
                    value.encode(enc);
                }
            }
            Self::List(items) => encode_list(enc, items),
            Self::Int(value) => encode_int(enc, *value),
            Self::Bytes(bytes) => encode_bounded_bytes(enc, bytes),
        }
    }

    /// Read one value from a decoder.
    pub fn decode(dec: &mut Decoder<'_>) -> CborResult<Self> {
        Self::decode_nested(dec, 0)
    }

    fn decode_nested(dec: &mut Decoder<'_>, depth: usize) -> CborResult<Self> {
        if depth > MAX_DEPTH {
            return Err(CborError {
                offset: dec.position(),
                message: "plutus data nested too deep".to_string(),
            });
        }
        match dec.kind()? {
            Kind::Unsigned | Kind::Negative => Ok(Self::Int(dec.int()?)),
            Kind::Bytes => Ok(Self::Bytes(dec.bytes()?)),
            Kind::Array => Ok(Self::List(decode_list(dec, depth)?)),
            Kind::Map => {
                let mut remaining = dec.map()?;
                let mut entries = Vec::new();
                while dec.has_next(&mut remaining)? {
                    let key = Self::decode_nested(dec, depth + 1)?;
                    let value = Self::decode_nested(dec, depth + 1)?;
                    entries.push((key, value));
                }
                Ok(Self::Map(entries))
            }
            Kind::Tag => {
                let offset = dec.position();
                let tag = dec.tag()?;
                match tag {
                    TAG_POS_BIGNUM | TAG_NEG_BIGNUM => decode_bignum(dec, tag, offset),
                    121..=127 => Ok(Self::constr(
                        tag - TAG_CONSTR_SMALL,
                        decode_list(dec, depth)?,
                    )),
                    1280..=1400 => Ok(Self::constr(
                        tag - TAG_CONSTR_LARGE + 7,
                        decode_list(dec, depth)?,
                    )),
                    TAG_CONSTR_GENERAL => {
                        let len = dec.array()?;
                        if len != Some(2) {
                            return Err(CborError {
                                offset,
                                message: "general constructor must be a 2-element array"
                                    .to_string(),
                            });
                        }
                        let alternative = dec.uint()?;
                        Ok(Self::constr(alternative, decode_list(dec, depth)?))
                    }
                    other => Err(CborError {
                        offset,
                        message: format!("unexpected tag {other} in plutus data"),
                    }),
                }
            }
            Kind::Text | Kind::Simple => Err(CborError {
                offset: dec.position(),
                message: "value is not plutus data".to_string(),
            }),
        }
    }
}

fn encode_list(enc: &mut Encoder, items: &[PlutusData]) {
    if items.is_empty() {
        enc.array(0);
    } else {
        enc.array_indefinite();
        for item in items {
            item.encode(enc);
        }
        enc.end();
    }
}

fn decode_list(dec: &mut Decoder<'_>, depth: usize) -> CborResult<Vec<PlutusData>> {
    let mut remaining = dec.array()?;
    let mut items = Vec::new();
    while dec.has_next(&mut remaining)? {
        items.push(PlutusData::decode_nested(dec, depth + 1)?);
    }
    Ok(items)
}

fn encode_int(enc: &mut Encoder, value: i128) {
    if let Ok(v) = u64::try_from(value) {
        enc.uint(v);
    } else if let Ok(n) = u64::try_from(-1 - value) {
        enc.negative(n);
    } else if value > 0 {
        enc.tag(TAG_POS_BIGNUM);
        encode_bounded_bytes(enc, &magnitude_bytes(value.unsigned_abs()));
    } else {
        enc.tag(TAG_NEG_BIGNUM);
        encode_bounded_bytes(enc, &magnitude_bytes((-1 - value).unsigned_abs()));
    }
}

fn magnitude_bytes(n: u128) -> Vec<u8> {
    let be = n.to_be_bytes();
    let first = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
    be[first..].to_vec()
}

fn decode_bignum(dec: &mut Decoder<'_>, tag: u64, offset: usize) -> CborResult<PlutusData> {
    let bytes = dec.bytes()?;
    let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if significant.len() > 16 || (significant.len() == 16 && significant[0] >= 0x80) {
        return Err(CborError {
            offset,
            message: "bignum exceeds supported range".to_string(),
        });
    }
    let magnitude = significant
        .iter()
        .fold(0i128, |acc, b| (acc << 8) | i128::from(*b));
    Ok(PlutusData::Int(if tag == TAG_POS_BIGNUM {
        magnitude
    } else {
        -1 - magnitude
    }))
}

fn encode_bounded_bytes(enc: &mut Encoder, bytes: &[u8]) {
    if bytes.len() <= BYTES_CHUNK {
        enc.bytes(bytes);
    } else {
        enc.bytes_indefinite();
        for chunk in bytes.chunks(BYTES_CHUNK) {
            enc.bytes(chunk);
        }
        enc.end();
    }
}
