//! In-memory ledger.
//!
//! A deterministic stand-in for a real chain. Submission applies the same
//! checks a node would for the transactions this crate builds: every
//! signature must verify against the transaction id, every required signer
//! and key-locked input must be witnessed, inputs must be unspent, script
//! inputs need redeemers, and lovelace must balance. Accepted transactions
//! consume their inputs for good and create new outputs.

use crate::address::Address;
use crate::amount::Lovelace;
use crate::digest::{KeyHash, TxHash, blake2b_256};
use crate::error::{LedgerError, Result};
use crate::provider::{LedgerProvider, TransactionInfo};
use crate::transaction::{SignedTransaction, TransactionBody, TransactionParts, WITNESS_REDEEMERS};
use crate::utxo::{OutputRef, Utxo};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct LedgerState {
    /// Live outputs in creation order.
    utxos: Vec<Utxo>,
    spent: HashSet<OutputRef>,
    transactions: HashMap<TxHash, TransactionInfo>,
    unavailable: bool,
    funding_nonce: u64,
    height: u64,
}

impl LedgerState {
    fn position(&self, out_ref: &OutputRef) -> Option<usize> {
        self.utxos.iter().position(|u| &u.out_ref == out_ref)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            Err(LedgerError::provider_unavailable("in-memory ledger is offline"))
        } else {
            Ok(())
        }
    }
}

/// Simulated ledger shared between clones.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pure-ADA output at `address` from nowhere.
    pub async fn fund(&self, address: &Address, amount: Lovelace) -> OutputRef {
        let mut state = self.state.lock().await;
        state.funding_nonce += 1;
        let mut seed = b"faucet".to_vec();
        seed.extend_from_slice(&state.funding_nonce.to_be_bytes());
        let out_ref = OutputRef::new(TxHash::new(blake2b_256(&seed)), 0);
        state
            .utxos
            .push(Utxo::new(out_ref, address.clone(), amount));
        debug!(address = %address, amount = %amount, out_ref = %out_ref, "funded address");
        out_ref
    }

    /// Insert an arbitrary output, e.g. one carrying a foreign datum.
    pub async fn insert_utxo(&self, utxo: Utxo) {
        let mut state = self.state.lock().await;
        if let Some(index) = state.position(&utxo.out_ref) {
            state.utxos[index] = utxo;
        } else {
            state.utxos.push(utxo);
        }
    }

    /// Whether an output has been consumed.
    pub async fn is_spent(&self, out_ref: &OutputRef) -> bool {
        self.state.lock().await.spent.contains(out_ref)
    }

    /// Look up a live output.
    pub async fn utxo(&self, out_ref: &OutputRef) -> Option<Utxo> {
        let state = self.state.lock().await;
        state.position(out_ref).map(|i| state.utxos[i].clone())
    }

    /// Number of live outputs.
    pub async fn utxo_count(&self) -> usize {
        self.state.lock().await.utxos.len()
    }

    /// Simulate an outage: every provider call fails while set.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    fn validate(state: &LedgerState, tx: &SignedTransaction) -> Result<(TransactionBody, Vec<Utxo>)> {
        let reject = |reason: String| LedgerError::rejected(reason, false);
        let parts = TransactionParts::split(tx.as_bytes())
            .map_err(|e| reject(format!("DeserialiseFailure: {e}")))?;
        let body = TransactionBody::decode(parts.body)
            .map_err(|e| reject(format!("DeserialiseFailure: {e}")))?;
        let witnesses = parts
            .vkey_witnesses()
            .map_err(|e| reject(format!("DeserialiseFailure: {e}")))?;

        let id = parts.id();
        if let Some(bad) = witnesses.iter().find(|w| !w.verifies(&id)) {
            return Err(reject(format!(
                "InvalidWitnessesUTXOW: signature by {} does not verify",
                bad.key_hash()
            )));
        }
        let witnessed: BTreeSet<KeyHash> = witnesses.iter().map(|w| w.key_hash()).collect();

        let mut spent = Vec::with_capacity(body.inputs.len());
        for input in &body.inputs {
            if state.spent.contains(input) {
                return Err(LedgerError::rejected(
                    format!("BadInputsUTxO: {input} already spent"),
                    true,
                ));
            }
            let index = state
                .position(input)
                .ok_or_else(|| reject(format!("BadInputsUTxO: {input} unknown")))?;
            spent.push(state.utxos[index].clone());
        }
        for collateral in &body.collateral {
            if state.position(collateral).is_none() {
                return Err(reject(format!("InsufficientCollateral: {collateral} unknown")));
            }
        }

        let mut needed: BTreeSet<KeyHash> = body.required_signers.iter().copied().collect();
        needed.extend(spent.iter().filter_map(|u| u.address.payment_key_hash()));
        let missing: Vec<String> = needed
            .difference(&witnessed)
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(reject(format!(
                "MissingVKeyWitnessesUTXOW: {}",
                missing.join(", ")
            )));
        }

        let spends_script = spent.iter().any(|u| u.address.payment_key_hash().is_none());
        if spends_script {
            let entries = parts
                .witness_entries()
                .map_err(|e| reject(format!("DeserialiseFailure: {e}")))?;
            if !entries.iter().any(|(key, _)| *key == WITNESS_REDEEMERS) {
                return Err(reject("MissingRedeemers".to_string()));
            }
        }

        let consumed: Lovelace = spent.iter().map(|u| u.value.coin).sum();
        let produced: Lovelace = body
            .outputs
            .iter()
            .map(|o| o.value.coin)
            .sum::<Lovelace>()
            .saturating_add(body.fee);
        if consumed != produced {
            return Err(reject(format!(
                "ValueNotConservedUTxO: consumed {consumed}, produced {produced}"
            )));
        }
        Ok((body, spent))
    }
}

impl LedgerProvider for InMemoryLedger {
    async fn fetch_utxos(&self, address: &Address) -> Result<Vec<Utxo>> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state
            .utxos
            .iter()
            .filter(|u| &u.address == address)
            .cloned()
            .collect())
    }

    async fn fetch_transaction(&self, tx_hash: &TxHash) -> Result<TransactionInfo> {
        let state = self.state.lock().await;
        state.check_available()?;
        state
            .transactions
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("transaction {tx_hash}")))
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<TxHash> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        let (body, spent) = match Self::validate(&state, tx) {
            Ok(checked) => checked,
            Err(e) => {
                warn!(tx_hash = %tx.id(), error = %e, "rejected transaction");
                return Err(e);
            }
        };

        let id = tx.id();
        for utxo in &spent {
            state.spent.insert(utxo.out_ref);
        }
        state.utxos.retain(|u| !body.inputs.contains(&u.out_ref));
        for (index, output) in body.outputs.iter().enumerate() {
            state.utxos.push(Utxo {
                out_ref: OutputRef::new(id, index as u32),
                address: output.address.clone(),
                value: output.value.clone(),
                inline_datum: output.inline_datum.clone(),
            });
        }
        state.height += 1;
        let height = state.height;
        state.transactions.insert(
            id,
            TransactionInfo {
                hash: id,
                block: Some(hex::encode(blake2b_256(&height.to_be_bytes()))),
                block_height: Some(height),
                block_time: Some(chrono::Utc::now().timestamp()),
                slot: Some(height * 20),
                fees: body.fee,
                size: tx.as_bytes().len() as u64,
                valid_contract: true,
            },
        );
        info!(
            tx_hash = %id,
            inputs = body.inputs.len(),
            outputs = body.outputs.len(),
            height,
            "applied transaction"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::transaction::{TxOutput, UnsignedTransaction, WitnessSet, encode_transaction};
    use crate::utxo::Value;
    use crate::wallet::KeyWallet;

    fn sign_body(wallet: &KeyWallet, body: TransactionBody) -> SignedTransaction {
        let unsigned = UnsignedTransaction::from_body(body, &[0xa0]);
        let witness = WitnessSet::new(vec![wallet.witness(&unsigned)]);
        let parts = TransactionParts::split(unsigned.as_bytes()).expect("split");
        let bytes = encode_transaction(parts.body, &witness.to_cbor(), true, &[0xf6]);
        SignedTransaction::from_bytes(bytes).expect("signed")
    }

    fn transfer(source: OutputRef, from: &Address, to: &Address, total: u64) -> TransactionBody {
        TransactionBody {
            inputs: vec![source],
            outputs: vec![
                TxOutput::new(to.clone(), Value::coin(Lovelace::from_ada(1))),
                TxOutput::new(from.clone(), Value::coin(Lovelace::new(total - 1_200_000))),
            ],
            fee: Lovelace::new(200_000),
            ..TransactionBody::default()
        }
    }

    #[tokio::test]
    async fn test_fund_and_fetch() {
        let ledger = InMemoryLedger::new();
        let address = Address::enterprise_key(Network::Preprod, &KeyHash::new([1; 28]));
        let first = ledger.fund(&address, Lovelace::from_ada(5)).await;
        let second = ledger.fund(&address, Lovelace::from_ada(7)).await;
        assert_ne!(first, second);
        let utxos = ledger.fetch_utxos(&address).await.expect("fetch");
        assert_eq!(utxos.len(), 2);
        assert_eq!(utxos[0].out_ref, first);
    }

    #[tokio::test]
    async fn test_submit_applies_spend() {
        let ledger = InMemoryLedger::new();
        let wallet = KeyWallet::generate().expect("wallet");
        let from = wallet.address(Network::Preprod);
        let to = Address::enterprise_key(Network::Preprod, &KeyHash::new([2; 28]));
        let source = ledger.fund(&from, Lovelace::from_ada(10)).await;

        let tx = sign_body(&wallet, transfer(source, &from, &to, 10_000_000));
        let id = ledger.submit_transaction(&tx).await.expect("accepted");
        assert_eq!(id, tx.id());
        assert!(ledger.is_spent(&source).await);
        assert!(ledger.utxo(&OutputRef::new(id, 0)).await.is_some());
        let info = ledger.fetch_transaction(&id).await.expect("info");
        assert_eq!(info.fees, Lovelace::new(200_000));
        assert!(info.is_confirmed());
    }

    #[tokio::test]
    async fn test_double_spend_is_conflict() {
        let ledger = InMemoryLedger::new();
        let wallet = KeyWallet::generate().expect("wallet");
        let from = wallet.address(Network::Preprod);
        let to = Address::enterprise_key(Network::Preprod, &KeyHash::new([2; 28]));
        let source = ledger.fund(&from, Lovelace::from_ada(10)).await;

        let first = sign_body(&wallet, transfer(source, &from, &to, 10_000_000));
        let mut other = transfer(source, &from, &to, 10_000_000);
        other.fee = Lovelace::new(300_000);
        other.outputs[1].value = Value::coin(Lovelace::new(8_700_000));
        let second = sign_body(&wallet, other);

        ledger.submit_transaction(&first).await.expect("first wins");
        let err = ledger.submit_transaction(&second).await.expect_err("second loses");
        assert!(err.is_spent_conflict());
    }

    #[tokio::test]
    async fn test_rejects_missing_witness() {
        let ledger = InMemoryLedger::new();
        let owner = KeyWallet::generate().expect("owner");
        let thief = KeyWallet::generate().expect("thief");
        let from = owner.address(Network::Preprod);
        let source = ledger.fund(&from, Lovelace::from_ada(10)).await;
        let tx = sign_body(&thief, transfer(source, &from, &from, 10_000_000));
        let err = ledger.submit_transaction(&tx).await.expect_err("unsigned by owner");
        assert!(matches!(err, LedgerError::Rejected { conflict: false, .. }));
        assert!(!ledger.is_spent(&source).await);
    }

    #[tokio::test]
    async fn test_rejects_unbalanced() {
        let ledger = InMemoryLedger::new();
        let wallet = KeyWallet::generate().expect("wallet");
        let from = wallet.address(Network::Preprod);
        let source = ledger.fund(&from, Lovelace::from_ada(10)).await;
        let tx = sign_body(&wallet, transfer(source, &from, &from, 11_000_000));
        let err = ledger.submit_transaction(&tx).await.expect_err("unbalanced");
        assert!(err.to_string().contains("ValueNotConserved"));
    }

    #[tokio::test]
    async fn test_outage() {
        let ledger = InMemoryLedger::new();
        let address = Address::enterprise_key(Network::Preprod, &KeyHash::new([1; 28]));
        ledger.set_unavailable(true).await;
        let err = ledger.fetch_utxos(&address).await.expect_err("offline");
        assert!(matches!(err, LedgerError::ProviderUnavailable { .. }));
        ledger.set_unavailable(false).await;
        assert!(ledger.fetch_utxos(&address).await.expect("online").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_transaction() {
        let ledger = InMemoryLedger::new();
        let err = ledger
            .fetch_transaction(&TxHash::new([0; 32]))
            .await
            .expect_err("unknown");
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }
}
