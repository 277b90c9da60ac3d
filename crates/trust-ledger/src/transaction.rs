//! Transaction wire format.
//!
//! A transaction is the four-element array `[body, witness_set, is_valid,
//! auxiliary_data]`. Its id is the BLAKE2b-256 hash of the body bytes, so the
//! body is carried as opaque bytes once built: anything that touches the
//! witness set afterwards must leave the body span untouched.

use crate::address::Address;
use crate::amount::Lovelace;
use crate::cbor::{CborError, CborResult, Decoder, Encoder, Kind};
use crate::digest::{Digest32, KeyHash, TxHash, blake2b_256};
use crate::error::{LedgerError, Result};
use crate::plutus::PlutusData;
use crate::utxo::{OutputRef, Value};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use tracing::debug;

const BODY_INPUTS: u64 = 0;
const BODY_OUTPUTS: u64 = 1;
const BODY_FEE: u64 = 2;
const BODY_SCRIPT_DATA_HASH: u64 = 11;
const BODY_COLLATERAL: u64 = 13;
const BODY_REQUIRED_SIGNERS: u64 = 14;

/// Witness set key holding vkey witnesses.
pub const WITNESS_VKEYS: u64 = 0;
/// Witness set key holding redeemers.
pub const WITNESS_REDEEMERS: u64 = 5;
/// Witness set key holding PlutusV3 scripts.
pub const WITNESS_PLUTUS_V3: u64 = 7;

const OUTPUT_ADDRESS: u64 = 0;
const OUTPUT_VALUE: u64 = 1;
const OUTPUT_DATUM: u64 = 2;
const DATUM_HASH: u64 = 0;
const DATUM_INLINE: u64 = 1;
const TAG_ENCODED_CBOR: u64 = 24;
const TAG_SET: u64 = 258;

/// Language id of PlutusV3 in the script-data hash language views.
const PLUTUS_V3_LANGUAGE: u64 = 2;

/// Execution budget of one script evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ExUnits {
    /// Memory units.
    pub mem: u64,
    /// CPU steps.
    pub steps: u64,
}

/// Which part of the transaction a redeemer applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemerTag {
    /// Spending a script-locked input.
    Spend,
}

impl RedeemerTag {
    const fn code(self) -> u64 {
        match self {
            Self::Spend => 0,
        }
    }
}

/// Argument passed to a validator for one script purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redeemer {
    /// Script purpose.
    pub tag: RedeemerTag,
    /// Index of the purpose's item, e.g. the input's position among the
    /// sorted inputs.
    pub index: u32,
    /// Redeemer value.
    pub data: PlutusData,
    /// Execution budget.
    pub ex_units: ExUnits,
}

impl Redeemer {
    fn encode(&self, enc: &mut Encoder) {
        enc.array(4).uint(self.tag.code()).uint(u64::from(self.index));
        self.data.encode(enc);
        enc.array(2).uint(self.ex_units.mem).uint(self.ex_units.steps);
    }
}

/// Encode redeemers in the array form.
#[must_use]
pub fn encode_redeemers(redeemers: &[Redeemer]) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.array(redeemers.len() as u64);
    for redeemer in redeemers {
        redeemer.encode(&mut enc);
    }
    enc.into_bytes()
}

/// Hash binding redeemers and cost model to the body: BLAKE2b-256 of the
/// redeemers followed by the PlutusV3 language view `{2: cost_model}`.
#[must_use]
pub fn script_data_hash(redeemers: &[Redeemer], cost_model: &[i64]) -> Digest32 {
    let mut preimage = encode_redeemers(redeemers);
    let mut views = Encoder::new();
    views.map(1).uint(PLUTUS_V3_LANGUAGE).array(cost_model.len() as u64);
    for &cost in cost_model {
        if cost >= 0 {
            views.uint(cost.unsigned_abs());
        } else {
            views.negative((-1 - cost).unsigned_abs());
        }
    }
    preimage.extend_from_slice(&views.into_bytes());
    Digest32::new(blake2b_256(&preimage))
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Receiving address.
    pub address: Address,
    /// Output value.
    pub value: Value,
    /// Inline datum bytes.
    pub inline_datum: Option<Vec<u8>>,
}

impl TxOutput {
    /// Output without a datum.
    #[must_use]
    pub const fn new(address: Address, value: Value) -> Self {
        Self {
            address,
            value,
            inline_datum: None,
        }
    }

    /// Output carrying an inline datum.
    #[must_use]
    pub const fn with_datum(address: Address, value: Value, datum: Vec<u8>) -> Self {
        Self {
            address,
            value,
            inline_datum: Some(datum),
        }
    }

    /// Encode in the post-Alonzo map form.
    pub fn encode(&self, enc: &mut Encoder) {
        let entries = if self.inline_datum.is_some() { 3 } else { 2 };
        enc.map(entries).uint(OUTPUT_ADDRESS).bytes(self.address.as_bytes());
        enc.uint(OUTPUT_VALUE);
        self.value.encode(enc);
        if let Some(datum) = &self.inline_datum {
            enc.uint(OUTPUT_DATUM)
                .array(2)
                .uint(DATUM_INLINE)
                .tag(TAG_ENCODED_CBOR)
                .bytes(datum);
        }
    }

    /// Decode either the map form or the legacy array form.
    pub fn decode(dec: &mut Decoder<'_>) -> CborResult<Self> {
        let offset = dec.position();
        let invalid = |message: String| CborError { offset, message };
        let mut address = None;
        let mut value = None;
        let mut inline_datum = None;
        if dec.kind()? == Kind::Array {
            let mut remaining = dec.array()?;
            let mut position = 0;
            while dec.has_next(&mut remaining)? {
                match position {
                    0 => address = Some(dec.bytes()?),
                    1 => value = Some(Value::decode(dec)?),
                    _ => dec.skip()?,
                }
                position += 1;
            }
        } else {
            let mut remaining = dec.map()?;
            while dec.has_next(&mut remaining)? {
                match dec.uint()? {
                    OUTPUT_ADDRESS => address = Some(dec.bytes()?),
                    OUTPUT_VALUE => value = Some(Value::decode(dec)?),
                    OUTPUT_DATUM => inline_datum = decode_datum_option(dec)?,
                    _ => dec.skip()?,
                }
            }
        }
        let address = address.ok_or_else(|| invalid("output has no address".to_string()))?;
        let address =
            Address::from_bytes(&address).map_err(|e| invalid(format!("output address: {e}")))?;
        let value = value.ok_or_else(|| invalid("output has no value".to_string()))?;
        Ok(Self {
            address,
            value,
            inline_datum,
        })
    }
}

fn decode_datum_option(dec: &mut Decoder<'_>) -> CborResult<Option<Vec<u8>>> {
    let offset = dec.position();
    if dec.array()? != Some(2) {
        return Err(CborError {
            offset,
            message: "datum option must be a 2-element array".to_string(),
        });
    }
    match dec.uint()? {
        DATUM_HASH => {
            dec.skip()?;
            Ok(None)
        }
        DATUM_INLINE => {
            if dec.tag()? != TAG_ENCODED_CBOR {
                return Err(CborError {
                    offset,
                    message: "inline datum must be tagged encoded CBOR".to_string(),
                });
            }
            Ok(Some(dec.bytes()?))
        }
        other => Err(CborError {
            offset,
            message: format!("unknown datum option {other}"),
        }),
    }
}

/// Read an array head, accepting the optional set tag.
fn read_set(dec: &mut Decoder<'_>) -> CborResult<Option<u64>> {
    if dec.kind()? == Kind::Tag {
        let offset = dec.position();
        if dec.tag()? != TAG_SET {
            return Err(CborError {
                offset,
                message: "expected set tag".to_string(),
            });
        }
    }
    dec.array()
}

fn decode_refs(dec: &mut Decoder<'_>) -> CborResult<Vec<OutputRef>> {
    let mut remaining = read_set(dec)?;
    let mut refs = Vec::new();
    while dec.has_next(&mut remaining)? {
        refs.push(OutputRef::decode(dec)?);
    }
    Ok(refs)
}

fn encode_refs(enc: &mut Encoder, refs: &[OutputRef]) {
    enc.array(refs.len() as u64);
    for out_ref in refs {
        out_ref.encode(enc);
    }
}

/// Transaction body fields this crate reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionBody {
    /// Spent inputs.
    pub inputs: Vec<OutputRef>,
    /// Produced outputs, in order.
    pub outputs: Vec<TxOutput>,
    /// Declared fee.
    pub fee: Lovelace,
    /// Hash binding redeemers and cost model; present when scripts run.
    pub script_data_hash: Option<Digest32>,
    /// Collateral inputs, forfeited if a script fails.
    pub collateral: Vec<OutputRef>,
    /// Key hashes that must sign the transaction.
    pub required_signers: Vec<KeyHash>,
}

impl TransactionBody {
    /// Inputs in canonical order: sorted by `(tx_hash, index)`.
    #[must_use]
    pub fn sorted_inputs(&self) -> Vec<OutputRef> {
        let mut inputs = self.inputs.clone();
        inputs.sort();
        inputs
    }

    /// Position of `out_ref` among the sorted inputs.
    #[must_use]
    pub fn input_index(&self, out_ref: &OutputRef) -> Option<u32> {
        self.sorted_inputs()
            .iter()
            .position(|input| input == out_ref)
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Encode the body map.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut entries = 3;
        if self.script_data_hash.is_some() {
            entries += 1;
        }
        if !self.collateral.is_empty() {
            entries += 1;
        }
        if !self.required_signers.is_empty() {
            entries += 1;
        }
        let mut enc = Encoder::new();
        enc.map(entries).uint(BODY_INPUTS);
        encode_refs(&mut enc, &self.sorted_inputs());
        enc.uint(BODY_OUTPUTS).array(self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(&mut enc);
        }
        enc.uint(BODY_FEE).uint(self.fee.lovelace());
        if let Some(hash) = &self.script_data_hash {
            enc.uint(BODY_SCRIPT_DATA_HASH).bytes(hash.as_bytes());
        }
        if !self.collateral.is_empty() {
            let mut collateral = self.collateral.clone();
            collateral.sort();
            enc.uint(BODY_COLLATERAL);
            encode_refs(&mut enc, &collateral);
        }
        if !self.required_signers.is_empty() {
            let signers: BTreeSet<&KeyHash> = self.required_signers.iter().collect();
            enc.uint(BODY_REQUIRED_SIGNERS).array(signers.len() as u64);
            for signer in signers {
                enc.bytes(signer.as_bytes());
            }
        }
        enc.into_bytes()
    }

    /// Decode a body map. Unknown keys are skipped.
    pub fn decode(bytes: &[u8]) -> CborResult<Self> {
        let mut dec = Decoder::new(bytes);
        let mut body = Self::default();
        let mut remaining = dec.map()?;
        while dec.has_next(&mut remaining)? {
            let offset = dec.position();
            match dec.uint()? {
                BODY_INPUTS => body.inputs = decode_refs(&mut dec)?,
                BODY_OUTPUTS => {
                    let mut outputs = dec.array()?;
                    while dec.has_next(&mut outputs)? {
                        body.outputs.push(TxOutput::decode(&mut dec)?);
                    }
                }
                BODY_FEE => body.fee = Lovelace::new(dec.uint()?),
                BODY_SCRIPT_DATA_HASH => {
                    let hash = Digest32::from_slice(&dec.bytes()?).map_err(|_| CborError {
                        offset,
                        message: "script data hash must be 32 bytes".to_string(),
                    })?;
                    body.script_data_hash = Some(hash);
                }
                BODY_COLLATERAL => body.collateral = decode_refs(&mut dec)?,
                BODY_REQUIRED_SIGNERS => {
                    let mut signers = read_set(&mut dec)?;
                    while dec.has_next(&mut signers)? {
                        let hash = KeyHash::from_slice(&dec.bytes()?).map_err(|_| CborError {
                            offset,
                            message: "required signer must be 28 bytes".to_string(),
                        })?;
                        body.required_signers.push(hash);
                    }
                }
                key => {
                    debug!(key, "skipping body field");
                    dec.skip()?;
                }
            }
        }
        dec.finish()?;
        Ok(body)
    }
}

/// One vkey witness: a verification key and its signature over the tx id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VkeyWitness {
    /// Ed25519 verification key.
    pub vkey: [u8; 32],
    /// Ed25519 signature.
    pub signature: [u8; 64],
}

impl VkeyWitness {
    /// Hash of the verification key.
    #[must_use]
    pub fn key_hash(&self) -> KeyHash {
        KeyHash::of_vkey(&self.vkey)
    }

    /// Check the signature against a transaction id.
    #[must_use]
    pub fn verifies(&self, tx_id: &TxHash) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.vkey) else {
            return false;
        };
        key.verify(tx_id.as_bytes(), &Signature::from_bytes(&self.signature))
            .is_ok()
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.array(2).bytes(&self.vkey).bytes(&self.signature);
    }

    fn decode(dec: &mut Decoder<'_>) -> CborResult<Self> {
        let offset = dec.position();
        let invalid = |message: &str| CborError {
            offset,
            message: message.to_string(),
        };
        if dec.array()? != Some(2) {
            return Err(invalid("vkey witness must be a 2-element array"));
        }
        let vkey = dec
            .bytes()?
            .try_into()
            .map_err(|_| invalid("vkey must be 32 bytes"))?;
        let signature = dec
            .bytes()?
            .try_into()
            .map_err(|_| invalid("signature must be 64 bytes"))?;
        Ok(Self { vkey, signature })
    }
}

/// Signatures produced by a signer for one transaction.
///
/// Encoded as a witness-set map holding only vkey witnesses, which is what
/// wallets return from partial signing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WitnessSet {
    vkeys: Vec<VkeyWitness>,
}

impl WitnessSet {
    /// Create a witness set.
    #[must_use]
    pub const fn new(vkeys: Vec<VkeyWitness>) -> Self {
        Self { vkeys }
    }

    /// The vkey witnesses.
    #[must_use]
    pub fn vkeys(&self) -> &[VkeyWitness] {
        &self.vkeys
    }

    /// Add a witness.
    pub fn push(&mut self, witness: VkeyWitness) {
        self.vkeys.push(witness);
    }

    /// True if there are no witnesses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vkeys.is_empty()
    }

    /// Key hashes of every signing key.
    #[must_use]
    pub fn key_hashes(&self) -> BTreeSet<KeyHash> {
        self.vkeys.iter().map(VkeyWitness::key_hash).collect()
    }

    /// Required signers this set does not cover.
    #[must_use]
    pub fn missing_signers(&self, required: &[KeyHash]) -> Vec<KeyHash> {
        let present = self.key_hashes();
        required
            .iter()
            .filter(|k| !present.contains(k))
            .copied()
            .collect()
    }

    /// Encode the vkey array alone.
    pub(crate) fn encode_vkeys(vkeys: &[VkeyWitness]) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.array(vkeys.len() as u64);
        for witness in vkeys {
            witness.encode(&mut enc);
        }
        enc.into_bytes()
    }

    /// Encode as `{0: [[vkey, signature], ...]}`.
    #[must_use]
    pub fn to_cbor(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.map(1)
            .uint(WITNESS_VKEYS)
            .raw(&Self::encode_vkeys(&self.vkeys));
        enc.into_bytes()
    }

    /// Hex form of [`WitnessSet::to_cbor`].
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_cbor())
    }

    /// Decode a witness-set map, keeping vkey witnesses only.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let parse = || -> CborResult<Self> {
            let mut dec = Decoder::new(bytes);
            let mut vkeys = Vec::new();
            let mut remaining = dec.map()?;
            while dec.has_next(&mut remaining)? {
                match dec.uint()? {
                    WITNESS_VKEYS => {
                        let mut items = read_set(&mut dec)?;
                        while dec.has_next(&mut items)? {
                            vkeys.push(VkeyWitness::decode(&mut dec)?);
                        }
                    }
                    key => {
                        debug!(key, "ignoring non-vkey witness entry");
                        dec.skip()?;
                    }
                }
            }
            dec.finish()?;
            Ok(Self { vkeys })
        };
        parse().map_err(|e| LedgerError::assembly(format!("malformed witness set: {e}")))
    }

    /// Decode from hex.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| LedgerError::assembly(format!("witness set is not valid hex: {e}")))?;
        Self::from_cbor(&bytes)
    }
}

/// Borrowed view of the four top-level items of a transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionParts<'a> {
    /// Raw body bytes.
    pub body: &'a [u8],
    /// Raw witness set bytes.
    pub witness_set: &'a [u8],
    /// Phase-two validity flag.
    pub is_valid: bool,
    /// Raw auxiliary data (usually null).
    pub auxiliary_data: &'a [u8],
}

impl<'a> TransactionParts<'a> {
    /// Split transaction bytes into raw spans.
    pub fn split(bytes: &'a [u8]) -> CborResult<Self> {
        let mut dec = Decoder::new(bytes);
        let len = dec.array()?;
        if len != Some(4) {
            return Err(CborError {
                offset: 0,
                message: "transaction must be a 4-element array".to_string(),
            });
        }
        let body = dec.raw_item()?;
        if Decoder::new(body).kind()? != Kind::Map {
            return Err(CborError {
                offset: 1,
                message: "transaction body must be a map".to_string(),
            });
        }
        let witness_set = dec.raw_item()?;
        if Decoder::new(witness_set).kind()? != Kind::Map {
            return Err(CborError {
                offset: 1 + body.len(),
                message: "witness set must be a map".to_string(),
            });
        }
        let is_valid = dec.bool()?;
        let auxiliary_data = dec.raw_item()?;
        dec.finish()?;
        Ok(Self {
            body,
            witness_set,
            is_valid,
            auxiliary_data,
        })
    }

    /// Transaction id.
    #[must_use]
    pub fn id(&self) -> TxHash {
        TxHash::of_body(self.body)
    }

    /// Top-level witness set entries as `(key, raw value)` pairs.
    pub fn witness_entries(&self) -> CborResult<Vec<(u64, &'a [u8])>> {
        let mut dec = Decoder::new(self.witness_set);
        let mut entries = Vec::new();
        let mut remaining = dec.map()?;
        while dec.has_next(&mut remaining)? {
            let key = dec.uint()?;
            entries.push((key, dec.raw_item()?));
        }
        dec.finish()?;
        Ok(entries)
    }

    /// Vkey witnesses already present in the witness set.
    pub fn vkey_witnesses(&self) -> CborResult<Vec<VkeyWitness>> {
        let mut vkeys = Vec::new();
        for (key, raw) in self.witness_entries()? {
            if key == WITNESS_VKEYS {
                let mut dec = Decoder::new(raw);
                let mut items = read_set(&mut dec)?;
                while dec.has_next(&mut items)? {
                    vkeys.push(VkeyWitness::decode(&mut dec)?);
                }
            }
        }
        Ok(vkeys)
    }
}

/// Join spans into `[body, witness_set, is_valid, auxiliary_data]`.
#[must_use]
pub fn encode_transaction(
    body: &[u8],
    witness_set: &[u8],
    is_valid: bool,
    auxiliary_data: &[u8],
) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.array(4)
        .raw(body)
        .raw(witness_set)
        .bool(is_valid)
        .raw(auxiliary_data);
    enc.into_bytes()
}

/// A built transaction awaiting signatures.
///
/// Opaque apart from the few accessors below; the bytes are what a wallet
/// receives for signing and what the assembler splices witnesses into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    bytes: Vec<u8>,
    id: TxHash,
    body: TransactionBody,
}

impl UnsignedTransaction {
    /// Build from a body and an encoded witness set (scripts and redeemers).
    ///
    /// The kept body is put in encoding order so it matches what
    /// [`Self::from_bytes`] decodes.
    pub(crate) fn from_body(mut body: TransactionBody, witness_set: &[u8]) -> Self {
        body.inputs.sort();
        body.collateral.sort();
        body.required_signers.sort();
        body.required_signers.dedup();
        let body_bytes = body.encode();
        let mut null = Encoder::new();
        null.null();
        let bytes = encode_transaction(&body_bytes, witness_set, true, &null.into_bytes());
        Self {
            id: TxHash::of_body(&body_bytes),
            bytes,
            body,
        }
    }

    /// Parse transaction bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let (id, body) = {
            let parts = TransactionParts::split(&bytes)
                .map_err(|e| LedgerError::assembly(format!("malformed transaction: {e}")))?;
            let body = TransactionBody::decode(parts.body)
                .map_err(|e| LedgerError::assembly(format!("malformed transaction body: {e}")))?;
            (parts.id(), body)
        };
        Ok(Self { bytes, id, body })
    }

    /// Parse hex-encoded transaction bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| LedgerError::assembly(format!("transaction is not valid hex: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Transaction bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex form of the bytes.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Transaction id.
    #[must_use]
    pub const fn id(&self) -> TxHash {
        self.id
    }

    /// Decoded body.
    #[must_use]
    pub const fn body(&self) -> &TransactionBody {
        &self.body
    }

    /// Declared required signers.
    #[must_use]
    pub fn required_signers(&self) -> &[KeyHash] {
        &self.body.required_signers
    }

    /// Declared fee.
    #[must_use]
    pub const fn fee(&self) -> Lovelace {
        self.body.fee
    }
}

impl Serialize for UnsignedTransaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for UnsignedTransaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for WitnessSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for WitnessSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A finalized transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    bytes: Vec<u8>,
    id: TxHash,
}

impl SignedTransaction {
    pub(crate) const fn new(bytes: Vec<u8>, id: TxHash) -> Self {
        Self { bytes, id }
    }

    /// Parse transaction bytes, checking the top-level structure.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let id = TransactionParts::split(&bytes)
            .map_err(|e| LedgerError::assembly(format!("malformed transaction: {e}")))?
            .id();
        Ok(Self { bytes, id })
    }

    /// Parse hex-encoded transaction bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| LedgerError::assembly(format!("transaction is not valid hex: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Transaction bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex form of the bytes.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Transaction id.
    #[must_use]
    pub const fn id(&self) -> TxHash {
        self.id
    }
}

impl Serialize for SignedTransaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SignedTransaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
