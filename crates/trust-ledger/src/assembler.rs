//! Transaction assembly: splicing externally produced signatures into an
//! unsigned transaction.
//!
//! The body span is copied byte for byte, so the transaction id the signer
//! signed is the id of the result. Only the witness set is rewritten: vkey
//! witnesses are merged with any already present, deduplicated and sorted
//! by verification key, and every other witness entry is kept verbatim in
//! ascending key order. Equal inputs therefore always give equal bytes.

use crate::cbor::Encoder;
use crate::digest::{KeyHash, TxHash};
use crate::error::{LedgerError, Result};
use crate::transaction::{
    SignedTransaction, TransactionBody, TransactionParts, UnsignedTransaction, VkeyWitness,
    WITNESS_VKEYS, WitnessSet, encode_transaction,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What the assembler can be handed.
#[derive(Debug, Clone)]
pub enum AssemblyInput {
    /// A transaction that is already fully signed.
    Signed(Vec<u8>),
    /// An unsigned transaction plus the signer's witnesses.
    Parts {
        /// Transaction from the builder.
        unsigned: UnsignedTransaction,
        /// Witnesses from the signer.
        witnesses: WitnessSet,
    },
}

/// Produce a finalized transaction.
///
/// # Errors
///
/// Returns `Assembly` if the transaction is malformed, a signature does not
/// verify against the transaction id, or a required signer has no witness.
pub fn assemble(input: &AssemblyInput) -> Result<SignedTransaction> {
    match input {
        AssemblyInput::Signed(bytes) => accept_signed(bytes),
        AssemblyInput::Parts {
            unsigned,
            witnesses,
        } => merge(unsigned, witnesses),
    }
}

/// Merge `witnesses` into `unsigned`.
pub fn merge(unsigned: &UnsignedTransaction, witnesses: &WitnessSet) -> Result<SignedTransaction> {
    let parts = split(unsigned.as_bytes())?;
    let id = parts.id();
    if witnesses.is_empty() {
        return Err(LedgerError::assembly("witness set holds no signatures"));
    }
    verify_all(witnesses.vkeys(), &id)?;

    let mut merged: BTreeMap<[u8; 32], VkeyWitness> = BTreeMap::new();
    let existing = parts
        .vkey_witnesses()
        .map_err(|e| LedgerError::assembly(format!("malformed witness set: {e}")))?;
    for witness in existing.into_iter().chain(witnesses.vkeys().iter().cloned()) {
        merged.entry(witness.vkey).or_insert(witness);
    }
    let merged: Vec<VkeyWitness> = merged.into_values().collect();
    check_coverage(unsigned.required_signers(), &merged, &id)?;
    check_required(unsigned.required_signers(), witnesses.vkeys(), &id)?;

    let mut entries: BTreeMap<u64, Vec<u8>> = parts
        .witness_entries()
        .map_err(|e| LedgerError::assembly(format!("malformed witness set: {e}")))?
        .into_iter()
        .map(|(key, raw)| (key, raw.to_vec()))
        .collect();
    entries.insert(WITNESS_VKEYS, WitnessSet::encode_vkeys(&merged));

    let mut witness_set = Encoder::new();
    witness_set.map(entries.len() as u64);
    for (key, raw) in &entries {
        witness_set.uint(*key).raw(raw);
    }
    let bytes = encode_transaction(
        parts.body,
        &witness_set.into_bytes(),
        parts.is_valid,
        parts.auxiliary_data,
    );
    info!(
        tx_hash = %id,
        witnesses = merged.len(),
        size = bytes.len(),
        "assembled transaction"
    );
    Ok(SignedTransaction::new(bytes, id))
}

/// Validate an already signed transaction and pass it through unchanged.
pub fn accept_signed(bytes: &[u8]) -> Result<SignedTransaction> {
    let parts = split(bytes)?;
    let id = parts.id();
    let body = TransactionBody::decode(parts.body)
        .map_err(|e| LedgerError::assembly(format!("malformed transaction body: {e}")))?;
    let witnesses = parts
        .vkey_witnesses()
        .map_err(|e| LedgerError::assembly(format!("malformed witness set: {e}")))?;
    if witnesses.is_empty() {
        return Err(LedgerError::assembly("transaction carries no signatures"));
    }
    verify_all(&witnesses, &id)?;
    check_coverage(&body.required_signers, &witnesses, &id)?;
    debug!(tx_hash = %id, "accepted signed transaction");
    Ok(SignedTransaction::new(bytes.to_vec(), id))
}

fn split(bytes: &[u8]) -> Result<TransactionParts<'_>> {
    TransactionParts::split(bytes)
        .map_err(|e| LedgerError::assembly(format!("malformed transaction: {e}")))
}

fn verify_all(witnesses: &[VkeyWitness], id: &TxHash) -> Result<()> {
    match witnesses.iter().find(|w| !w.verifies(id)) {
        Some(bad) => Err(LedgerError::assembly(format!(
            "signature by key {} does not verify against transaction {id}",
            bad.key_hash()
        ))),
        None => Ok(()),
    }
}

fn check_required(required: &[KeyHash], witnesses: &[VkeyWitness], id: &TxHash) -> Result<()> {
    match witnesses.iter().map(VkeyWitness::key_hash).find(|k| !required.contains(k)) {
        Some(extra) => Err(LedgerError::assembly(format!(
            "key {extra} is not a required signer of transaction {id}"
        ))),
        None => Ok(()),
    }
}

fn check_coverage(required: &[KeyHash], witnesses: &[VkeyWitness], id: &TxHash) -> Result<()> {
    let missing = WitnessSet::new(witnesses.to_vec()).missing_signers(required);
    if missing.is_empty() {
        return Ok(());
    }
    let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();
    Err(LedgerError::assembly(format!(
        "transaction {id} requires signatures from {}",
        missing.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Network};
    use crate::amount::Lovelace;
    use crate::transaction::TxOutput;
    use crate::utxo::{OutputRef, Value};
    use crate::wallet::KeyWallet;

    fn unsigned_requiring(signers: &[KeyHash], witness_template: &[u8]) -> UnsignedTransaction {
        let address = Address::enterprise_key(Network::Preprod, &signers[0]);
        let body = TransactionBody {
            inputs: vec![OutputRef::new(TxHash::new([1; 32]), 0)],
            outputs: vec![TxOutput::new(address, Value::coin(Lovelace::from_ada(3)))],
            fee: Lovelace::new(180_000),
            required_signers: signers.to_vec(),
            ..TransactionBody::default()
        };
        UnsignedTransaction::from_body(body, witness_template)
    }

    #[test]
    fn test_merge_keeps_body_verbatim() {
        let wallet = KeyWallet::generate().expect("wallet");
        let unsigned = unsigned_requiring(&[wallet.key_hash()], &[0xa0]);
        let witnesses = WitnessSet::new(vec![wallet.witness(&unsigned)]);
        let signed = merge(&unsigned, &witnesses).expect("assemble");
        assert_eq!(signed.id(), unsigned.id());
        let before = TransactionParts::split(unsigned.as_bytes()).expect("split unsigned");
        let after = TransactionParts::split(signed.as_bytes()).expect("split signed");
        assert_eq!(before.body, after.body);
        assert_eq!(after.vkey_witnesses().expect("vkeys").len(), 1);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let a = KeyWallet::generate().expect("wallet a");
        let b = KeyWallet::generate().expect("wallet b");
        let unsigned = unsigned_requiring(&[a.key_hash(), b.key_hash()], &[0xa0]);
        let forward = WitnessSet::new(vec![a.witness(&unsigned), b.witness(&unsigned)]);
        let reverse = WitnessSet::new(vec![b.witness(&unsigned), a.witness(&unsigned)]);
        let first = merge(&unsigned, &forward).expect("first");
        let second = merge(&unsigned, &forward).expect("second");
        let third = merge(&unsigned, &reverse).expect("third");
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first.as_bytes(), third.as_bytes());
    }

    #[test]
    fn test_rejects_wrong_key() {
        let k1 = KeyWallet::generate().expect("k1");
        let k2 = KeyWallet::generate().expect("k2");
        let unsigned = unsigned_requiring(&[k2.key_hash()], &[0xa0]);
        let witnesses = WitnessSet::new(vec![k1.witness(&unsigned)]);
        let err = merge(&unsigned, &witnesses).expect_err("wrong signer");
        assert!(matches!(err, LedgerError::Assembly { .. }));
        assert!(err.to_string().contains(&k2.key_hash().to_hex()));
    }

    #[test]
    fn test_rejects_witness_from_non_required_key() {
        let signer = KeyWallet::generate().expect("signer");
        let stranger = KeyWallet::generate().expect("stranger");
        let unsigned = unsigned_requiring(&[signer.key_hash()], &[0xa0]);
        let witnesses =
            WitnessSet::new(vec![signer.witness(&unsigned), stranger.witness(&unsigned)]);
        let err = merge(&unsigned, &witnesses).expect_err("extra signer");
        assert!(matches!(err, LedgerError::Assembly { .. }));
        assert!(err.to_string().contains("not a required signer"));
        assert!(err.to_string().contains(&stranger.key_hash().to_hex()));
    }

    #[test]
    fn test_rejects_signature_for_other_transaction() {
        let wallet = KeyWallet::generate().expect("wallet");
        let unsigned = unsigned_requiring(&[wallet.key_hash()], &[0xa0]);
        let mut other_body = unsigned.body().clone();
        other_body.fee = Lovelace::new(999_999);
        let other = UnsignedTransaction::from_body(other_body, &[0xa0]);
        let witnesses = WitnessSet::new(vec![wallet.witness(&other)]);
        let err = merge(&unsigned, &witnesses).expect_err("stale signature");
        assert!(err.to_string().contains("does not verify"));
    }

    #[test]
    fn test_rejects_empty_witness_set() {
        let wallet = KeyWallet::generate().expect("wallet");
        let unsigned = unsigned_requiring(&[wallet.key_hash()], &[0xa0]);
        assert!(merge(&unsigned, &WitnessSet::default()).is_err());
    }

    #[test]
    fn test_keeps_script_witness_entries() {
        let wallet = KeyWallet::generate().expect("wallet");
        // {5: [], 7: [h'01']}
        let mut template = Encoder::new();
        template.map(2).uint(5).array(0).uint(7).array(1).bytes(&[0x01]);
        let unsigned = unsigned_requiring(&[wallet.key_hash()], &template.into_bytes());
        let witnesses = WitnessSet::new(vec![wallet.witness(&unsigned)]);
        let signed = merge(&unsigned, &witnesses).expect("assemble");
        let parts = TransactionParts::split(signed.as_bytes()).expect("split");
        let keys: Vec<u64> = parts
            .witness_entries()
            .expect("entries")
            .iter()
            .map(|(k, _)| *k)
            .collect();
        assert_eq!(keys, vec![0, 5, 7]);
    }

    #[test]
    fn test_signed_passthrough() {
        let wallet = KeyWallet::generate().expect("wallet");
        let unsigned = unsigned_requiring(&[wallet.key_hash()], &[0xa0]);
        let witnesses = WitnessSet::new(vec![wallet.witness(&unsigned)]);
        let signed = merge(&unsigned, &witnesses).expect("assemble");
        let again = assemble(&AssemblyInput::Signed(signed.as_bytes().to_vec())).expect("accept");
        assert_eq!(again, signed);
        // Re-merging the same witnesses leaves the bytes unchanged.
        let remerged = merge(
            &UnsignedTransaction::from_bytes(signed.as_bytes().to_vec()).expect("parse"),
            &witnesses,
        )
        .expect("remerge");
        assert_eq!(remerged, signed);
    }

    #[test]
    fn test_signed_without_signatures_rejected() {
        let wallet = KeyWallet::generate().expect("wallet");
        let unsigned = unsigned_requiring(&[wallet.key_hash()], &[0xa0]);
        let err = assemble(&AssemblyInput::Signed(unsigned.as_bytes().to_vec()))
            .expect_err("unsigned");
        assert!(matches!(err, LedgerError::Assembly { .. }));
    }

    #[test]
    fn test_malformed_bytes_rejected() {
        let err = accept_signed(&[0x83, 0x00]).expect_err("garbage");
        assert!(matches!(err, LedgerError::Assembly { .. }));
    }
}
