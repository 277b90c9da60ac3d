//! UTXO types.
//!
//! A review record is never mutated in place: each [`ReviewUtxo`] is an
//! immutable value keyed by its [`OutputRef`]. An upvote spends the current
//! reference and produces a new one; the old reference is retired for good.

use crate::address::Address;
use crate::amount::Lovelace;
use crate::cbor::{CborResult, Decoder, Encoder, Kind};
use crate::datum::{ReviewDatum, ReviewKey};
use crate::digest::{ScriptHash, TxHash};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference to a transaction output: `(tx_hash, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
    /// Transaction that created the output.
    pub tx_hash: TxHash,
    /// Position among that transaction's outputs.
    pub index: u32,
}

impl OutputRef {
    /// Create an output reference.
    #[must_use]
    pub const fn new(tx_hash: TxHash, index: u32) -> Self {
        Self { tx_hash, index }
    }

    /// Encode as the ledger's `[tx_hash, index]` pair.
    pub fn encode(&self, enc: &mut Encoder) {
        enc.array(2)
            .bytes(self.tx_hash.as_bytes())
            .uint(u64::from(self.index));
    }

    /// Decode a `[tx_hash, index]` pair.
    pub fn decode(dec: &mut Decoder<'_>) -> CborResult<Self> {
        let offset = dec.position();
        let invalid = |message: &str| crate::cbor::CborError {
            offset,
            message: message.to_string(),
        };
        if dec.array()? != Some(2) {
            return Err(invalid("input must be a 2-element array"));
        }
        let hash = dec.bytes()?;
        let tx_hash = TxHash::from_slice(&hash).map_err(|_| invalid("input hash must be 32 bytes"))?;
        let index = u32::try_from(dec.uint()?).map_err(|_| invalid("input index too large"))?;
        Ok(Self { tx_hash, index })
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.index)
    }
}

impl FromStr for OutputRef {
    type Err = LedgerError;

    /// Parse the `tx_hash#index` form.
    fn from_str(s: &str) -> Result<Self> {
        let (hash, index) = s
            .split_once('#')
            .ok_or_else(|| LedgerError::validation(format!("expected tx_hash#index, got '{s}'")))?;
        let index = index
            .parse()
            .map_err(|_| LedgerError::validation(format!("invalid output index '{index}'")))?;
        Ok(Self::new(TxHash::from_hex(hash)?, index))
    }
}

/// A native asset quantity inside a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Asset {
    /// Minting policy.
    pub policy_id: ScriptHash,
    /// Asset name bytes, hex in serde form.
    #[serde(with = "hex_bytes")]
    pub name: Vec<u8>,
    /// Quantity.
    pub quantity: u64,
}

/// Value held by an output: lovelace plus native assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Value {
    /// ADA amount.
    pub coin: Lovelace,
    /// Native assets, kept in canonical order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,
}

impl Value {
    /// A pure-ADA value.
    #[must_use]
    pub const fn coin(coin: Lovelace) -> Self {
        Self {
            coin,
            assets: Vec::new(),
        }
    }

    /// Value with native assets; assets are sorted by policy then name.
    #[must_use]
    pub fn with_assets(coin: Lovelace, mut assets: Vec<Asset>) -> Self {
        assets.sort_by(|a, b| {
            a.policy_id
                .cmp(&b.policy_id)
                .then_with(|| a.name.len().cmp(&b.name.len()))
                .then_with(|| a.name.cmp(&b.name))
        });
        Self { coin, assets }
    }

    /// True if only ADA is held.
    #[must_use]
    pub fn is_pure_ada(&self) -> bool {
        self.assets.is_empty()
    }

    /// Encode as a coin or `[coin, multiasset]`.
    pub fn encode(&self, enc: &mut Encoder) {
        if self.assets.is_empty() {
            enc.uint(self.coin.lovelace());
            return;
        }
        enc.array(2).uint(self.coin.lovelace());
        let mut policies: Vec<(&ScriptHash, Vec<&Asset>)> = Vec::new();
        for asset in &self.assets {
            match policies.last_mut() {
                Some((policy, group)) if *policy == &asset.policy_id => group.push(asset),
                _ => policies.push((&asset.policy_id, vec![asset])),
            }
        }
        enc.map(policies.len() as u64);
        for (policy, group) in policies {
            enc.bytes(policy.as_bytes()).map(group.len() as u64);
            for asset in group {
                enc.bytes(&asset.name).uint(asset.quantity);
            }
        }
    }

    /// Decode a coin or `[coin, multiasset]`.
    pub fn decode(dec: &mut Decoder<'_>) -> CborResult<Self> {
        if dec.kind()? == Kind::Unsigned {
            return Ok(Self::coin(Lovelace::new(dec.uint()?)));
        }
        let offset = dec.position();
        if dec.array()? != Some(2) {
            return Err(crate::cbor::CborError {
                offset,
                message: "value must be a coin or a 2-element array".to_string(),
            });
        }
        let coin = Lovelace::new(dec.uint()?);
        let mut assets = Vec::new();
        let mut policies = dec.map()?;
        while dec.has_next(&mut policies)? {
            let policy_offset = dec.position();
            let policy_id = ScriptHash::from_slice(&dec.bytes()?).map_err(|_| {
                crate::cbor::CborError {
                    offset: policy_offset,
                    message: "policy id must be 28 bytes".to_string(),
                }
            })?;
            let mut names = dec.map()?;
            while dec.has_next(&mut names)? {
                let name = dec.bytes()?;
                let quantity = dec.uint()?;
                assets.push(Asset {
                    policy_id,
                    name,
                    quantity,
                });
            }
        }
        Ok(Self::with_assets(coin, assets))
    }
}

/// An unspent output as reported by a ledger provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Where the output lives.
    pub out_ref: OutputRef,
    /// Address holding the output.
    pub address: Address,
    /// Held value.
    pub value: Value,
    /// Inline datum bytes, if present.
    #[serde(default, with = "hex_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub inline_datum: Option<Vec<u8>>,
}

impl Utxo {
    /// A pure-ADA output without a datum.
    #[must_use]
    pub const fn new(out_ref: OutputRef, address: Address, coin: Lovelace) -> Self {
        Self {
            out_ref,
            address,
            value: Value::coin(coin),
            inline_datum: None,
        }
    }

    /// Whether coin selection may spend this output: pure ADA, no datum.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.value.is_pure_ada() && self.inline_datum.is_none()
    }
}

/// A live review record: one script-locked UTXO and its decoded datum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewUtxo {
    /// Where the record lives.
    pub out_ref: OutputRef,
    /// Locked value.
    pub value: Value,
    /// Decoded review record.
    pub datum: ReviewDatum,
}

impl ReviewUtxo {
    /// Identity of the logical review.
    #[must_use]
    pub fn key(&self) -> ReviewKey {
        self.datum.key()
    }

    /// True if `self` is a valid later generation of `older`: same logical
    /// review and counters that never decrease.
    #[must_use]
    pub fn supersedes(&self, older: &Self) -> bool {
        self.key() == older.key()
            && self.out_ref != older.out_ref
            && self.datum.upvotes >= older.datum.upvotes
            && self.datum.flags >= older.datum.flags
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)] // serde's `with` passes `&Option<T>`
    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
