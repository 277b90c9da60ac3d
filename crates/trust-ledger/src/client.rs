//! Review ledger client.
//!
//! [`ReviewLedger`] ties a ledger provider, configuration and the compiled
//! validator together and exposes the review operations. It holds no ledger
//! state of its own: every call reads fresh state from the provider.

use crate::address::{Address, Network};
use crate::assembler::{self, AssemblyInput};
use crate::builder::TransactionBuilder;
use crate::config::LedgerConfig;
use crate::datum::ReviewKey;
use crate::digest::{Digest32, KeyHash, TxHash};
use crate::error::{LedgerError, Result};
use crate::indexer::ReviewIndex;
use crate::provider::{LedgerProvider, TransactionInfo};
use crate::reputation;
use crate::script::ValidatorScript;
use crate::transaction::{SignedTransaction, UnsignedTransaction};
use crate::utxo::{OutputRef, ReviewUtxo, Utxo};
use tracing::{info, warn};

/// Client for the review ledger.
pub struct ReviewLedger<P> {
    provider: P,
    config: LedgerConfig,
    script: Option<ValidatorScript>,
    script_address: Address,
}

impl<P: LedgerProvider> ReviewLedger<P> {
    /// Create a client.
    ///
    /// The script address is the configured override, else derived from
    /// `script` for the configured network.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid or neither gives a
    /// script address.
    pub fn new(provider: P, config: LedgerConfig, script: Option<ValidatorScript>) -> Result<Self> {
        config.validate()?;
        let derived = script.as_ref().map(|s| s.address(config.network));
        let script_address = match (config.script_address.clone(), derived) {
            (Some(configured), Some(derived)) => {
                if configured != derived {
                    warn!(
                        configured = %configured,
                        derived = %derived,
                        "configured script address differs from the validator's address"
                    );
                }
                configured
            }
            (Some(address), None) | (None, Some(address)) => address,
            (None, None) => {
                return Err(LedgerError::config(
                    "no script address: set script_address or blueprint_path",
                ));
            }
        };
        info!(
            network = %config.network,
            script_address = %script_address,
            upvotes_enabled = script.is_some(),
            "review ledger ready"
        );
        Ok(Self {
            provider,
            config,
            script,
            script_address,
        })
    }

    /// Create a client, loading the validator from the configured blueprint.
    ///
    /// A blueprint that fails to load is tolerated when a script address is
    /// configured; upvotes then fail with `ScriptUnavailable`.
    ///
    /// # Errors
    ///
    /// Returns the load error when there is no other way to find the script
    /// address.
    pub fn from_config(provider: P, config: LedgerConfig) -> Result<Self> {
        let script = match &config.blueprint_path {
            Some(path) => {
                match ValidatorScript::from_blueprint_file(path, config.validator_title.as_deref()) {
                    Ok(script) => Some(script),
                    Err(e) if config.script_address.is_some() => {
                        warn!(error = %e, "validator unavailable, upvotes disabled");
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            None => None,
        };
        Self::new(provider, config, script)
    }

    /// The provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Network in use.
    #[must_use]
    pub const fn network(&self) -> Network {
        self.config.network
    }

    /// Address holding review records.
    #[must_use]
    pub const fn script_address(&self) -> &Address {
        &self.script_address
    }

    /// The loaded validator, if any.
    #[must_use]
    pub const fn script(&self) -> Option<&ValidatorScript> {
        self.script.as_ref()
    }

    fn builder(&self) -> TransactionBuilder<'_, P> {
        TransactionBuilder::new(
            &self.provider,
            &self.config.protocol,
            &self.script_address,
            self.script.as_ref(),
        )
    }

    /// Build an unsigned transaction submitting a new review.
    ///
    /// # Errors
    ///
    /// As [`TransactionBuilder::build_submission`].
    pub async fn build_submission(
        &self,
        wallet: &Address,
        reviewer: KeyHash,
        product_id: Digest32,
        rating: u8,
        review_hash: Digest32,
    ) -> Result<UnsignedTransaction> {
        self.builder()
            .build_submission(wallet, reviewer, product_id, rating, review_hash)
            .await
    }

    /// Build an unsigned transaction upvoting `review`.
    ///
    /// # Errors
    ///
    /// As [`TransactionBuilder::build_upvote`].
    pub async fn build_upvote(
        &self,
        wallet: &Address,
        review: &Utxo,
        voter: KeyHash,
    ) -> Result<UnsignedTransaction> {
        self.builder().build_upvote(wallet, review, voter).await
    }

    /// Re-read the record at `out_ref` and build an upvote for it.
    ///
    /// # Errors
    ///
    /// Returns `Utxo` if the output is no longer live at the script address,
    /// otherwise as [`Self::build_upvote`].
    pub async fn upvote_by_ref(
        &self,
        wallet: &Address,
        out_ref: &OutputRef,
        voter: KeyHash,
    ) -> Result<UnsignedTransaction> {
        let utxos = self.provider.fetch_utxos(&self.script_address).await?;
        let review = utxos
            .into_iter()
            .find(|u| &u.out_ref == out_ref)
            .ok_or_else(|| {
                LedgerError::utxo(format!("review output {out_ref} is not live at the script address"))
            })?;
        self.build_upvote(wallet, &review, voter).await
    }

    /// Find the current generation of a logical review and build an upvote
    /// for it. This is the recovery path after losing an upvote race.
    ///
    /// # Errors
    ///
    /// Returns `Utxo` if no live generation exists, otherwise as
    /// [`Self::build_upvote`].
    pub async fn upvote_latest(
        &self,
        wallet: &Address,
        key: &ReviewKey,
        voter: KeyHash,
    ) -> Result<UnsignedTransaction> {
        let utxos = self.provider.fetch_utxos(&self.script_address).await?;
        let index = ReviewIndex::from_utxos(&utxos);
        let current = index
            .latest(key)
            .map(|r| r.out_ref)
            .ok_or_else(|| LedgerError::utxo("no live generation of the review"))?;
        let review = utxos
            .into_iter()
            .find(|u| u.out_ref == current)
            .ok_or_else(|| LedgerError::utxo(format!("review output {current} vanished")))?;
        self.build_upvote(wallet, &review, voter).await
    }

    /// Produce a finalized transaction.
    ///
    /// # Errors
    ///
    /// As [`assembler::assemble`].
    pub fn assemble(&self, input: &AssemblyInput) -> Result<SignedTransaction> {
        assembler::assemble(input)
    }

    /// Submit once.
    ///
    /// # Errors
    ///
    /// The provider's rejection or transport error; see
    /// [`LedgerError::is_spent_conflict`].
    pub async fn submit(&self, tx: &SignedTransaction) -> Result<TxHash> {
        self.provider.submit_transaction(tx).await
    }

    /// Scan every review record.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn reviews(&self) -> Result<ReviewIndex> {
        ReviewIndex::scan(&self.provider, &self.script_address).await
    }

    /// Live reviews of a product.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn reviews_for_product(&self, product_id: &Digest32) -> Result<Vec<ReviewUtxo>> {
        let index = self.reviews().await?;
        Ok(index.by_product(product_id).into_iter().cloned().collect())
    }

    /// Live reviews by a reviewer.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn reviews_by_reviewer(&self, reviewer: &KeyHash) -> Result<Vec<ReviewUtxo>> {
        let index = self.reviews().await?;
        Ok(index.by_reviewer(reviewer).into_iter().cloned().collect())
    }

    /// Reputation of a reviewer; 0 when the provider is unreachable.
    pub async fn reputation(&self, reviewer: &KeyHash) -> u64 {
        reputation::fetch_reputation(&self.provider, &self.script_address, reviewer).await
    }

    /// Details of a transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown hash, or the provider's error.
    pub async fn transaction_details(&self, tx_hash: &TxHash) -> Result<TransactionInfo> {
        self.provider.fetch_transaction(tx_hash).await
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl<P> std::fmt::Debug for ReviewLedger<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewLedger")
            .field("network", &self.config.network)
            .field("script_address", &self.script_address)
            .field("script", &self.script)
            .finish_non_exhaustive()
    }
}
