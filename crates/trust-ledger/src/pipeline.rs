//! The signing pipeline: Built → Signed → Assembled → Submitted.
//!
//! A [`PendingTransaction`] carries a transaction through the four stages
//! and checks each transition. It serializes to JSON, so a transaction
//! whose signing happens elsewhere (a browser wallet, a hardware key) can be
//! persisted after building and resumed once the witnesses come back.

use crate::assembler;
use crate::digest::{KeyHash, TxHash};
use crate::error::{LedgerError, Result};
use crate::provider::{LedgerProvider, Signer};
use crate::transaction::{SignedTransaction, UnsignedTransaction, VkeyWitness, WitnessSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Unsigned transaction built, waiting for signatures.
    Built,
    /// Every required signer has a witness.
    Signed,
    /// Witnesses merged into a finalized transaction.
    Assembled,
    /// Accepted by the ledger.
    Submitted,
}

impl PipelineStage {
    /// Check if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Built => write!(f, "built"),
            Self::Signed => write!(f, "signed"),
            Self::Assembled => write!(f, "assembled"),
            Self::Submitted => write!(f, "submitted"),
        }
    }
}

/// A transaction in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransaction {
    stage: PipelineStage,
    id: TxHash,
    unsigned: Option<UnsignedTransaction>,
    #[serde(default)]
    witnesses: WitnessSet,
    signed: Option<SignedTransaction>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PendingTransaction {
    /// Start from a freshly built transaction.
    #[must_use]
    pub fn new(unsigned: UnsignedTransaction) -> Self {
        let now = Utc::now();
        Self {
            stage: PipelineStage::Built,
            id: unsigned.id(),
            unsigned: Some(unsigned),
            witnesses: WitnessSet::default(),
            signed: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start from a transaction that was signed and finalized elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `Assembly` if the transaction fails structural or signature
    /// checks.
    pub fn finalized(signed: &SignedTransaction) -> Result<Self> {
        let accepted = assembler::accept_signed(signed.as_bytes())?;
        let now = Utc::now();
        Ok(Self {
            stage: PipelineStage::Assembled,
            id: accepted.id(),
            unsigned: None,
            witnesses: WitnessSet::default(),
            signed: Some(accepted),
            last_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Transaction id, identical at every stage.
    #[must_use]
    pub const fn id(&self) -> TxHash {
        self.id
    }

    /// The unsigned transaction, absent when the pipeline started finalized.
    #[must_use]
    pub const fn unsigned(&self) -> Option<&UnsignedTransaction> {
        self.unsigned.as_ref()
    }

    /// Witnesses collected so far.
    #[must_use]
    pub const fn witnesses(&self) -> &WitnessSet {
        &self.witnesses
    }

    /// The finalized transaction once assembled.
    #[must_use]
    pub const fn signed(&self) -> Option<&SignedTransaction> {
        self.signed.as_ref()
    }

    /// Error from the most recent failed submission.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last transition.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Required signers still without a witness.
    #[must_use]
    pub fn missing_signers(&self) -> Vec<KeyHash> {
        self.unsigned
            .as_ref()
            .map(|tx| self.witnesses.missing_signers(tx.required_signers()))
            .unwrap_or_default()
    }

    fn transition_error(&self, to: PipelineStage) -> LedgerError {
        LedgerError::InvalidTransition {
            from: self.stage.to_string(),
            to: to.to_string(),
        }
    }

    fn touch(&mut self, stage: PipelineStage) {
        self.stage = stage;
        self.updated_at = Utc::now();
    }

    /// Add witnesses from one signer.
    ///
    /// Witnesses from several signers accumulate; the stage moves to
    /// `Signed` once every required signer is covered. Returns the signers
    /// still missing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` past the `Signed` stage, and `Assembly` if
    /// the set is empty, a signature does not verify against the transaction
    /// id, or a key is not among the required signers.
    pub fn attach_witnesses(&mut self, witnesses: &WitnessSet) -> Result<Vec<KeyHash>> {
        let unsigned = match (&self.stage, &self.unsigned) {
            (PipelineStage::Built | PipelineStage::Signed, Some(unsigned)) => unsigned,
            _ => return Err(self.transition_error(PipelineStage::Signed)),
        };
        if witnesses.is_empty() {
            return Err(LedgerError::assembly("witness set holds no signatures"));
        }
        let required = unsigned.required_signers();
        for witness in witnesses.vkeys() {
            check_witness(witness, &unsigned.id(), required)?;
        }

        for witness in witnesses.vkeys() {
            if !self.witnesses.vkeys().iter().any(|w| w.vkey == witness.vkey) {
                self.witnesses.push(witness.clone());
            }
        }
        let missing = self.witnesses.missing_signers(required);
        if missing.is_empty() {
            self.touch(PipelineStage::Signed);
            info!(tx_hash = %self.id, witnesses = self.witnesses.vkeys().len(), "transaction signed");
        } else {
            self.updated_at = Utc::now();
        }
        Ok(missing)
    }

    /// Ask `signer` for witnesses and attach them.
    ///
    /// # Errors
    ///
    /// Propagates the signer's error, then as [`Self::attach_witnesses`].
    pub async fn sign_with<S: Signer>(&mut self, signer: &S) -> Result<Vec<KeyHash>> {
        let Some(unsigned) = self.unsigned.as_ref() else {
            return Err(self.transition_error(PipelineStage::Signed));
        };
        if !matches!(self.stage, PipelineStage::Built | PipelineStage::Signed) {
            return Err(self.transition_error(PipelineStage::Signed));
        }
        let witnesses = signer.sign(unsigned).await?;
        self.attach_witnesses(&witnesses)
    }

    /// Merge the collected witnesses into a finalized transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the stage is `Signed`.
    pub fn assemble(&mut self) -> Result<&SignedTransaction> {
        let unsigned = match (&self.stage, &self.unsigned) {
            (PipelineStage::Signed, Some(unsigned)) => unsigned,
            _ => return Err(self.transition_error(PipelineStage::Assembled)),
        };
        let signed = assembler::merge(unsigned, &self.witnesses)?;
        self.touch(PipelineStage::Assembled);
        Ok(&*self.signed.insert(signed))
    }

    /// Submit once. A rejected or failed submission leaves the transaction
    /// `Assembled` with the error recorded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the stage is `Assembled`, otherwise
    /// the provider's error.
    pub async fn submit<P: LedgerProvider>(&mut self, provider: &P) -> Result<TxHash> {
        let signed = match (&self.stage, &self.signed) {
            (PipelineStage::Assembled, Some(signed)) => signed,
            _ => return Err(self.transition_error(PipelineStage::Submitted)),
        };
        match provider.submit_transaction(signed).await {
            Ok(hash) => {
                self.last_error = None;
                self.touch(PipelineStage::Submitted);
                info!(tx_hash = %hash, "transaction submitted");
                Ok(hash)
            }
            Err(e) => {
                warn!(tx_hash = %self.id, error = %e, "submission failed");
                self.last_error = Some(e.to_string());
                self.updated_at = Utc::now();
                Err(e)
            }
        }
    }

    /// Serialize for resumption.
    ///
    /// # Errors
    ///
    /// Returns `Json` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Resume a serialized pipeline.
    ///
    /// # Errors
    ///
    /// Returns `Json` for malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn check_witness(witness: &VkeyWitness, id: &TxHash, required: &[KeyHash]) -> Result<()> {
    let key_hash = witness.key_hash();
    if !witness.verifies(id) {
        return Err(LedgerError::assembly(format!(
            "signature by key {key_hash} does not verify against transaction {id}"
        )));
    }
    if !required.contains(&key_hash) {
        return Err(LedgerError::assembly(format!(
            "key {key_hash} is not a required signer of transaction {id}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Network};
    use crate::amount::Lovelace;
    use crate::memory::InMemoryLedger;
    use crate::transaction::{TransactionBody, TxOutput};
    use crate::utxo::{OutputRef, Value};
    use crate::wallet::KeyWallet;

    fn unsigned_requiring(signers: &[KeyHash]) -> UnsignedTransaction {
        let address = Address::enterprise_key(Network::Preprod, &signers[0]);
        let body = TransactionBody {
            inputs: vec![OutputRef::new(TxHash::new([1; 32]), 0)],
            outputs: vec![TxOutput::new(address, Value::coin(Lovelace::from_ada(3)))],
            fee: Lovelace::new(180_000),
            required_signers: signers.to_vec(),
            ..TransactionBody::default()
        };
        UnsignedTransaction::from_body(body, &[0xa0])
    }

    #[tokio::test]
    async fn test_stages_in_order() {
        let wallet = KeyWallet::generate().expect("wallet");
        let mut pending = PendingTransaction::new(unsigned_requiring(&[wallet.key_hash()]));
        assert_eq!(pending.stage(), PipelineStage::Built);

        let missing = pending.sign_with(&wallet).await.expect("sign");
        assert!(missing.is_empty());
        assert_eq!(pending.stage(), PipelineStage::Signed);

        let signed_id = pending.assemble().expect("assemble").id();
        assert_eq!(signed_id, pending.id());
        assert_eq!(pending.stage(), PipelineStage::Assembled);
    }

    #[test]
    fn test_assemble_before_signing_rejected() {
        let wallet = KeyWallet::generate().expect("wallet");
        let mut pending = PendingTransaction::new(unsigned_requiring(&[wallet.key_hash()]));
        let err = pending.assemble().expect_err("not signed");
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
        assert!(err.to_string().contains("built"));
    }

    #[tokio::test]
    async fn test_submit_before_assembly_rejected() {
        let wallet = KeyWallet::generate().expect("wallet");
        let mut pending = PendingTransaction::new(unsigned_requiring(&[wallet.key_hash()]));
        pending.sign_with(&wallet).await.expect("sign");
        let err = pending
            .submit(&InMemoryLedger::new())
            .await
            .expect_err("not assembled");
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
        assert_eq!(pending.stage(), PipelineStage::Signed);
    }

    #[tokio::test]
    async fn test_partial_signatures_accumulate() {
        let a = KeyWallet::generate().expect("a");
        let b = KeyWallet::generate().expect("b");
        let mut pending = PendingTransaction::new(unsigned_requiring(&[a.key_hash(), b.key_hash()]));

        let missing = pending.sign_with(&a).await.expect("sign a");
        assert_eq!(missing, vec![b.key_hash()]);
        assert_eq!(pending.stage(), PipelineStage::Built);

        let missing = pending.sign_with(&b).await.expect("sign b");
        assert!(missing.is_empty());
        assert_eq!(pending.stage(), PipelineStage::Signed);
        assert_eq!(pending.witnesses().vkeys().len(), 2);
    }

    #[tokio::test]
    async fn test_foreign_signer_rejected() {
        let required = KeyWallet::generate().expect("required");
        let stranger = KeyWallet::generate().expect("stranger");
        let mut pending = PendingTransaction::new(unsigned_requiring(&[required.key_hash()]));
        let err = pending.sign_with(&stranger).await.expect_err("foreign key");
        assert!(matches!(err, LedgerError::Assembly { .. }));
        assert_eq!(pending.stage(), PipelineStage::Built);
        assert!(pending.witnesses().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submission_stays_assembled() {
        let wallet = KeyWallet::generate().expect("wallet");
        let mut pending = PendingTransaction::new(unsigned_requiring(&[wallet.key_hash()]));
        pending.sign_with(&wallet).await.expect("sign");
        pending.assemble().expect("assemble");

        // The input does not exist on this ledger.
        let err = pending
            .submit(&InMemoryLedger::new())
            .await
            .expect_err("unknown input");
        assert!(matches!(err, LedgerError::Rejected { .. }));
        assert_eq!(pending.stage(), PipelineStage::Assembled);
        assert!(pending.last_error().is_some());
    }

    #[tokio::test]
    async fn test_resume_from_json() {
        let wallet = KeyWallet::generate().expect("wallet");
        let pending = PendingTransaction::new(unsigned_requiring(&[wallet.key_hash()]));
        let json = pending.to_json().expect("serialize");
        assert!(json.contains("\"built\""));

        let mut resumed = PendingTransaction::from_json(&json).expect("deserialize");
        assert_eq!(resumed.id(), pending.id());
        resumed.sign_with(&wallet).await.expect("sign");
        resumed.assemble().expect("assemble");

        let reloaded = PendingTransaction::from_json(&resumed.to_json().expect("serialize"))
            .expect("deserialize");
        assert_eq!(reloaded.stage(), PipelineStage::Assembled);
        assert_eq!(reloaded.signed(), resumed.signed());
    }

    #[tokio::test]
    async fn test_finalized_starts_assembled() {
        let wallet = KeyWallet::generate().expect("wallet");
        let mut pending = PendingTransaction::new(unsigned_requiring(&[wallet.key_hash()]));
        pending.sign_with(&wallet).await.expect("sign");
        let signed = pending.assemble().expect("assemble").clone();

        let resumed = PendingTransaction::finalized(&signed).expect("finalized");
        assert_eq!(resumed.stage(), PipelineStage::Assembled);
        assert!(resumed.unsigned().is_none());
        assert!(resumed.missing_signers().is_empty());
    }
}
