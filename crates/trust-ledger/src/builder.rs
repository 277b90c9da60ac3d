//! Unsigned transaction construction for review submission and upvoting.
//!
//! Both builders follow the same loop: select inputs for the current fee
//! estimate, lay out the body, measure the transaction it will become once
//! signed, and repeat with the measured fee until the fee written into the
//! body covers it.

use crate::address::Address;
use crate::amount::Lovelace;
use crate::cbor::Encoder;
use crate::config::ProtocolParams;
use crate::datum::{ReviewAction, ReviewDatum};
use crate::digest::{Digest32, KeyHash};
use crate::error::{LedgerError, Result};
use crate::provider::LedgerProvider;
use crate::script::ValidatorScript;
use crate::selection::{Selection, select_collateral, select_sequential};
use crate::transaction::{
    Redeemer, RedeemerTag, TransactionBody, TxOutput, UnsignedTransaction,
    WITNESS_PLUTUS_V3, WITNESS_REDEEMERS, encode_redeemers, script_data_hash,
};
use crate::utxo::{Utxo, Value};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Encoded size of one `[vkey, signature]` witness.
const VKEY_WITNESS_SIZE: usize = 101;

/// Fee re-estimation rounds before giving up.
const MAX_FEE_ROUNDS: usize = 4;

/// Builds unsigned review transactions from live ledger state.
#[derive(Debug)]
pub struct TransactionBuilder<'a, P> {
    provider: &'a P,
    params: &'a ProtocolParams,
    script_address: &'a Address,
    script: Option<&'a ValidatorScript>,
}

impl<'a, P: LedgerProvider> TransactionBuilder<'a, P> {
    /// Create a builder. Without a script only submissions can be built.
    #[must_use]
    pub const fn new(
        provider: &'a P,
        params: &'a ProtocolParams,
        script_address: &'a Address,
        script: Option<&'a ValidatorScript>,
    ) -> Self {
        Self {
            provider,
            params,
            script_address,
            script,
        }
    }

    async fn wallet_utxos(&self, wallet: &Address) -> Result<Vec<Utxo>> {
        self.provider
            .fetch_utxos(wallet)
            .await
            .map_err(|e| LedgerError::builder(format!("cannot fetch wallet UTXOs: {e}")))
    }

    /// Build a transaction locking a new review at the script address,
    /// timestamped now.
    ///
    /// # Errors
    ///
    /// `Validation` for a rating outside 1..=5, `InsufficientFunds` when the
    /// wallet cannot cover the locked value plus fee, `Builder` when the
    /// wallet's UTXOs cannot be fetched.
    pub async fn build_submission(
        &self,
        wallet: &Address,
        reviewer: KeyHash,
        product_id: Digest32,
        rating: u8,
        review_hash: Digest32,
    ) -> Result<UnsignedTransaction> {
        let timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        self.build_submission_at(wallet, reviewer, product_id, rating, review_hash, timestamp)
            .await
    }

    /// [`TransactionBuilder::build_submission`] with an explicit timestamp.
    pub async fn build_submission_at(
        &self,
        wallet: &Address,
        reviewer: KeyHash,
        product_id: Digest32,
        rating: u8,
        review_hash: Digest32,
        timestamp: u64,
    ) -> Result<UnsignedTransaction> {
        let datum = ReviewDatum::new(product_id, rating, review_hash, reviewer, timestamp)?;
        let utxos = self.wallet_utxos(wallet).await?;
        let locked = Value::coin(Lovelace::new(self.params.script_locked_lovelace));
        let review_output =
            TxOutput::with_datum(self.script_address.clone(), locked.clone(), datum.to_cbor());
        let witness_template = empty_map();

        let mut fee = self.params.size_fee(0);
        for round in 0..MAX_FEE_ROUNDS {
            let selection = select_sequential(
                &utxos,
                locked.coin.saturating_add(fee),
                Lovelace::new(self.params.min_change_lovelace),
                &[],
            )?;
            let signers = required_signers(reviewer, selection.inputs.iter());
            let mut outputs = vec![review_output.clone()];
            outputs.extend(change_output(wallet, &selection));
            let body = TransactionBody {
                inputs: selection.inputs.iter().map(|u| u.out_ref).collect(),
                outputs,
                fee,
                required_signers: signers,
                ..TransactionBody::default()
            };
            let needed = self.params.size_fee(signed_size(&body, &witness_template));
            debug!(round, fee = %fee, needed = %needed, "submission fee round");
            if needed <= fee {
                let tx = UnsignedTransaction::from_body(body, &witness_template);
                info!(
                    tx_hash = %tx.id(),
                    product_id = %product_id,
                    rating,
                    fee = %fee,
                    inputs = tx.body().inputs.len(),
                    "built review submission"
                );
                return Ok(tx);
            }
            fee = needed;
        }
        Err(LedgerError::builder("fee estimate did not converge"))
    }

    /// Build a transaction spending `review` and recreating it with one
    /// more upvote. Fees and collateral come from `wallet`; change returns
    /// to it.
    ///
    /// # Errors
    ///
    /// `Utxo` if `review` has no inline datum, `Validation` if it is not at
    /// the script address, `InvalidDatum` if its datum is not a review,
    /// `ScriptUnavailable` without a loaded validator, `InsufficientFunds`
    /// or `Builder` as for submissions.
    pub async fn build_upvote(
        &self,
        wallet: &Address,
        review: &Utxo,
        voter: KeyHash,
    ) -> Result<UnsignedTransaction> {
        let datum_bytes = review.inline_datum.as_deref().ok_or_else(|| {
            LedgerError::utxo(format!("review UTXO {} has no inline datum", review.out_ref))
        })?;
        if &review.address != self.script_address {
            return Err(LedgerError::validation(format!(
                "UTXO {} is not at the review script address",
                review.out_ref
            )));
        }
        let current = ReviewDatum::from_cbor(datum_bytes)?;
        let updated = current.with_upvote()?;
        let script = self.script.ok_or_else(|| {
            LedgerError::script_unavailable("no compiled validator loaded")
        })?;

        let utxos = self.wallet_utxos(wallet).await?;
        let replacement = TxOutput::with_datum(
            self.script_address.clone(),
            review.value.clone(),
            updated.to_cbor(),
        );
        let redeemer_data = ReviewAction::Upvote { voter }.to_plutus();
        let ex_units = self.params.upvote_ex_units;
        let script_fee = self.params.script_fee(ex_units)?;

        let mut fee = self.params.size_fee(0).saturating_add(script_fee);
        for round in 0..MAX_FEE_ROUNDS {
            let selection = select_sequential(
                &utxos,
                fee,
                Lovelace::new(self.params.min_change_lovelace),
                &[review.out_ref],
            )?;
            let collateral = select_collateral(&utxos, self.params.collateral_for(fee))?;
            let signers = required_signers(
                voter,
                selection.inputs.iter().chain(std::iter::once(&collateral)),
            );
            let mut inputs = vec![review.out_ref];
            inputs.extend(selection.inputs.iter().map(|u| u.out_ref));
            let mut outputs = vec![replacement.clone()];
            outputs.extend(change_output(wallet, &selection));
            let mut body = TransactionBody {
                inputs,
                outputs,
                fee,
                collateral: vec![collateral.out_ref],
                required_signers: signers,
                ..TransactionBody::default()
            };
            let index = body.input_index(&review.out_ref).ok_or_else(|| {
                LedgerError::builder("review input missing from sorted inputs")
            })?;
            let redeemers = [Redeemer {
                tag: RedeemerTag::Spend,
                index,
                data: redeemer_data.clone(),
                ex_units,
            }];
            body.script_data_hash = Some(script_data_hash(
                &redeemers,
                &self.params.cost_model_v3,
            ));
            let witness_template = script_witnesses(&redeemers, script);
            let needed = self
                .params
                .size_fee(signed_size(&body, &witness_template))
                .saturating_add(script_fee);
            debug!(round, fee = %fee, needed = %needed, "upvote fee round");
            if needed <= fee {
                let tx = UnsignedTransaction::from_body(body, &witness_template);
                info!(
                    tx_hash = %tx.id(),
                    review = %review.out_ref,
                    upvotes = updated.upvotes,
                    fee = %fee,
                    "built upvote"
                );
                return Ok(tx);
            }
            fee = needed;
        }
        Err(LedgerError::builder("fee estimate did not converge"))
    }
}

fn empty_map() -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.map(0);
    enc.into_bytes()
}

fn script_witnesses(redeemers: &[Redeemer], script: &ValidatorScript) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.map(2)
        .uint(WITNESS_REDEEMERS)
        .raw(&encode_redeemers(redeemers))
        .uint(WITNESS_PLUTUS_V3)
        .array(1)
        .bytes(script.code());
    enc.into_bytes()
}

fn change_output(wallet: &Address, selection: &Selection) -> Option<TxOutput> {
    (!selection.change.is_zero())
        .then(|| TxOutput::new(wallet.clone(), Value::coin(selection.change)))
}

/// The named signer plus the payment key of every spent wallet output.
fn required_signers<'u>(signer: KeyHash, spent: impl Iterator<Item = &'u Utxo>) -> Vec<KeyHash> {
    let mut signers = BTreeSet::from([signer]);
    signers.extend(spent.filter_map(|u| u.address.payment_key_hash()));
    signers.into_iter().collect()
}

/// Size of the transaction once one witness per required signer is added.
fn signed_size(body: &TransactionBody, witness_template: &[u8]) -> usize {
    let witnesses = body.required_signers.len();
    // vkey entry: key, array head (up to 3 bytes), witnesses
    let vkey_entry = 1 + 3 + witnesses * VKEY_WITNESS_SIZE;
    // array head, body, witness map, validity flag, null auxiliary data
    1 + body.encode().len() + witness_template.len() + vkey_entry + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::memory::InMemoryLedger;
    use crate::transaction::TransactionParts;
    use crate::utxo::OutputRef;
    use crate::digest::TxHash;
    use test_case::test_case;

    const SCRIPT_CODE: &str = "4e4d01000033222220051200120011";

    struct Fixture {
        ledger: InMemoryLedger,
        params: ProtocolParams,
        script: ValidatorScript,
        script_address: Address,
        wallet: Address,
        key_hash: KeyHash,
    }

    impl Fixture {
        async fn new(funds: &[u64]) -> Self {
            let script =
                ValidatorScript::from_compiled(hex::decode(SCRIPT_CODE).expect("hex")).expect("script");
            let key_hash = KeyHash::new([0x42; 28]);
            let wallet = Address::enterprise_key(Network::Preprod, &key_hash);
            let ledger = InMemoryLedger::new();
            for &amount in funds {
                ledger.fund(&wallet, Lovelace::new(amount)).await;
            }
            Self {
                ledger,
                params: ProtocolParams::default(),
                script_address: script.address(Network::Preprod),
                script,
                wallet,
                key_hash,
            }
        }

        fn builder(&self) -> TransactionBuilder<'_, InMemoryLedger> {
            TransactionBuilder::new(
                &self.ledger,
                &self.params,
                &self.script_address,
                Some(&self.script),
            )
        }

        async fn review_utxo(&self, upvotes: u64) -> Utxo {
            let mut datum = ReviewDatum::new(
                Digest32::new([1; 32]),
                5,
                Digest32::new([2; 32]),
                KeyHash::new([3; 28]),
                1_700_000_000,
            )
            .expect("datum");
            datum.upvotes = upvotes;
            let utxo = Utxo {
                out_ref: OutputRef::new(TxHash::new([0xee; 32]), 0),
                address: self.script_address.clone(),
                value: Value::coin(Lovelace::from_ada(2)),
                inline_datum: Some(datum.to_cbor()),
            };
            self.ledger.insert_utxo(utxo.clone()).await;
            utxo
        }
    }

    #[test_case(0 ; "zero")]
    #[test_case(6 ; "six")]
    #[tokio::test]
    async fn test_submission_rejects_rating(rating: u8) {
        let fx = Fixture::new(&[10_000_000]).await;
        let err = fx
            .builder()
            .build_submission(&fx.wallet, fx.key_hash, Digest32::new([1; 32]), rating, Digest32::new([2; 32]))
            .await
            .expect_err("invalid rating");
        assert!(matches!(err, LedgerError::Validation { .. }));
    }

    #[test_case(1 ; "one")]
    #[test_case(3 ; "three")]
    #[test_case(5 ; "five")]
    #[tokio::test]
    async fn test_submission_accepts_rating(rating: u8) {
        let fx = Fixture::new(&[10_000_000]).await;
        let tx = fx
            .builder()
            .build_submission(&fx.wallet, fx.key_hash, Digest32::new([1; 32]), rating, Digest32::new([2; 32]))
            .await
            .expect("valid rating");
        let output = &tx.body().outputs[0];
        let datum = ReviewDatum::from_cbor(output.inline_datum.as_deref().expect("datum"))
            .expect("decode");
        assert_eq!(datum.rating, rating);
        assert_eq!((datum.upvotes, datum.flags, datum.verified), (0, 0, false));
        assert!(datum.timestamp > 1_700_000_000);
    }

    #[tokio::test]
    async fn test_submission_layout_and_fee() {
        let fx = Fixture::new(&[3_000_000, 8_000_000]).await;
        let tx = fx
            .builder()
            .build_submission_at(&fx.wallet, fx.key_hash, Digest32::new([1; 32]), 4, Digest32::new([2; 32]), 42)
            .await
            .expect("build");
        let body = tx.body();
        assert_eq!(body.inputs.len(), 2);
        assert_eq!(body.outputs[0].address, fx.script_address);
        assert_eq!(body.outputs[0].value.coin, Lovelace::from_ada(2));
        assert_eq!(body.outputs[1].address, fx.wallet);
        let out_total: u64 = body.outputs.iter().map(|o| o.value.coin.lovelace()).sum();
        assert_eq!(out_total + body.fee.lovelace(), 11_000_000);
        assert_eq!(body.required_signers, vec![fx.key_hash]);
        // Declared fee covers the fully witnessed size.
        let witnessed = tx.as_bytes().len() + VKEY_WITNESS_SIZE + 4;
        assert!(body.fee >= fx.params.size_fee(witnessed));
        let parts = TransactionParts::split(tx.as_bytes()).expect("split");
        assert_eq!(parts.witness_set, &[0xa0]);
    }

    #[tokio::test]
    async fn test_submission_insufficient_funds() {
        let fx = Fixture::new(&[1_500_000]).await;
        let err = fx
            .builder()
            .build_submission(&fx.wallet, fx.key_hash, Digest32::new([1; 32]), 4, Digest32::new([2; 32]))
            .await
            .expect_err("underfunded");
        assert!(matches!(err, LedgerError::InsufficientFunds { have: 1_500_000, .. }));
    }

    #[tokio::test]
    async fn test_submission_without_provider_is_builder_error() {
        let fx = Fixture::new(&[10_000_000]).await;
        fx.ledger.set_unavailable(true).await;
        let err = fx
            .builder()
            .build_submission(&fx.wallet, fx.key_hash, Digest32::new([1; 32]), 4, Digest32::new([2; 32]))
            .await
            .expect_err("offline");
        assert!(matches!(err, LedgerError::Builder { .. }));
    }

    #[tokio::test]
    async fn test_upvote_increments_only_upvotes() {
        let fx = Fixture::new(&[10_000_000, 10_000_000]).await;
        let review = fx.review_utxo(7).await;
        let voter = KeyHash::new([0x99; 28]);
        let tx = fx
            .builder()
            .build_upvote(&fx.wallet, &review, voter)
            .await
            .expect("build upvote");
        let body = tx.body();
        let before = ReviewDatum::from_cbor(review.inline_datum.as_deref().expect("datum"))
            .expect("decode before");
        let after = ReviewDatum::from_cbor(body.outputs[0].inline_datum.as_deref().expect("datum"))
            .expect("decode after");
        assert_eq!(after.upvotes, 8);
        assert_eq!(after, ReviewDatum { upvotes: 8, ..before });
        assert_eq!(body.outputs[0].value, review.value);
        assert!(body.inputs.contains(&review.out_ref));
        assert_eq!(body.collateral.len(), 1);
        assert!(body.script_data_hash.is_some());
        assert!(body.required_signers.contains(&voter));
        assert!(body.required_signers.contains(&fx.key_hash));
        assert!(
            body.fee
                >= fx
                    .params
                    .script_fee(fx.params.upvote_ex_units)
                    .expect("valid prices")
        );
    }

    #[tokio::test]
    async fn test_upvote_without_datum_is_utxo_error() {
        let fx = Fixture::new(&[10_000_000]).await;
        let mut review = fx.review_utxo(0).await;
        review.inline_datum = None;
        let err = fx
            .builder()
            .build_upvote(&fx.wallet, &review, fx.key_hash)
            .await
            .expect_err("no datum");
        assert!(matches!(err, LedgerError::Utxo { .. }));
    }

    #[tokio::test]
    async fn test_upvote_off_script_is_validation_error() {
        let fx = Fixture::new(&[10_000_000]).await;
        let mut review = fx.review_utxo(0).await;
        review.address = fx.wallet.clone();
        let err = fx
            .builder()
            .build_upvote(&fx.wallet, &review, fx.key_hash)
            .await
            .expect_err("wrong address");
        assert!(matches!(err, LedgerError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_upvote_foreign_datum_is_invalid_datum() {
        let fx = Fixture::new(&[10_000_000]).await;
        let mut review = fx.review_utxo(0).await;
        review.inline_datum = Some(vec![0xd8, 0x7a, 0x80]);
        let err = fx
            .builder()
            .build_upvote(&fx.wallet, &review, fx.key_hash)
            .await
            .expect_err("foreign datum");
        assert!(matches!(err, LedgerError::InvalidDatum { .. }));
    }

    #[tokio::test]
    async fn test_upvote_without_script() {
        let fx = Fixture::new(&[10_000_000]).await;
        let review = fx.review_utxo(0).await;
        let builder = TransactionBuilder::new(&fx.ledger, &fx.params, &fx.script_address, None);
        let err = builder
            .build_upvote(&fx.wallet, &review, fx.key_hash)
            .await
            .expect_err("no script");
        assert!(matches!(err, LedgerError::ScriptUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_upvote_with_zero_price_denominator_is_config_error() {
        let mut fx = Fixture::new(&[10_000_000, 10_000_000]).await;
        fx.params.price_steps.denominator = 0;
        let review = fx.review_utxo(0).await;
        let err = fx
            .builder()
            .build_upvote(&fx.wallet, &review, fx.key_hash)
            .await
            .expect_err("zero denominator");
        assert!(matches!(err, LedgerError::Config { .. }));
    }

    #[tokio::test]
    async fn test_upvote_needs_collateral() {
        // Enough for the fee but nothing meets the 5 ADA collateral floor.
        let fx = Fixture::new(&[2_000_000, 2_000_000]).await;
        let review = fx.review_utxo(0).await;
        let err = fx
            .builder()
            .build_upvote(&fx.wallet, &review, fx.key_hash)
            .await
            .expect_err("no collateral");
        assert!(matches!(err, LedgerError::InsufficientFunds { need: 5_000_000, .. }));
    }

    #[test]
    fn test_required_signers_are_deduplicated() {
        let key = KeyHash::new([1; 28]);
        let address = Address::enterprise_key(Network::Preprod, &key);
        let utxos = [
            Utxo::new(OutputRef::new(TxHash::new([1; 32]), 0), address.clone(), Lovelace::new(1)),
            Utxo::new(OutputRef::new(TxHash::new([2; 32]), 0), address, Lovelace::new(1)),
        ];
        assert_eq!(required_signers(key, utxos.iter()), vec![key]);
    }
}
