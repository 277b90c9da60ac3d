//! Review submission and upvote commands.
//!
//! With `--signing-key` the transaction goes through the whole pipeline and
//! is submitted. With `--wallet` and `--key-hash` it stops after building:
//! the unsigned transaction is printed for an external signer, and the
//! pending state can be saved with `--out` and continued with `resume`.

use std::io::Write;
use std::path::Path;

use tracing::info;
use trust_ledger::{
    Address, BlockfrostProvider, KeyHash, KeyWallet, OutputRef, PendingTransaction, ReviewLedger,
    UnsignedTransaction, product_id_for_sku, review_content_hash,
};

use super::query::{parse_digest, parse_key_hash};
use super::{Context, save_pending};
use crate::cli::{SubmitReviewArgs, UpvoteArgs, WalletArgs};
use crate::error::CliError;
use crate::output::{OutputFormat, TransactionView};

/// Who pays for a transaction and how it gets signed.
#[derive(Debug)]
enum Payer {
    /// Sign here with a local key.
    Key(KeyWallet),
    /// Leave signing to an external wallet.
    External { wallet: Address, key_hash: KeyHash },
}

impl Payer {
    fn from_args(
        args: &WalletArgs,
        ledger: &ReviewLedger<BlockfrostProvider>,
    ) -> Result<Self, CliError> {
        match (&args.signing_key, &args.wallet, &args.key_hash) {
            (Some(path), _, _) => Ok(Self::Key(KeyWallet::from_file(path)?)),
            (None, Some(wallet), Some(key_hash)) => {
                let wallet: Address = wallet
                    .parse()
                    .map_err(|e| CliError::InvalidArgument(format!("wallet address: {e}")))?;
                if wallet.network_id() != ledger.network().network_id() {
                    return Err(CliError::InvalidArgument(format!(
                        "wallet address is not a {} address",
                        ledger.network()
                    )));
                }
                Ok(Self::External {
                    wallet,
                    key_hash: parse_key_hash(key_hash)?,
                })
            }
            _ => Err(CliError::InvalidArgument(
                "either --signing-key or --wallet with --key-hash is required".to_string(),
            )),
        }
    }

    fn wallet(&self, ledger: &ReviewLedger<BlockfrostProvider>) -> Address {
        match self {
            Self::Key(key) => key.address(ledger.network()),
            Self::External { wallet, .. } => wallet.clone(),
        }
    }

    fn key_hash(&self) -> KeyHash {
        match self {
            Self::Key(key) => key.key_hash(),
            Self::External { key_hash, .. } => *key_hash,
        }
    }
}

/// Review command executor.
pub struct ReviewCommand {
    context: Context,
}

impl ReviewCommand {
    /// Create a new review command.
    #[must_use]
    pub const fn new(context: Context) -> Self {
        Self { context }
    }

    /// Build a review submission, then sign and submit it if a key is given.
    ///
    /// # Errors
    ///
    /// Returns an error if arguments are invalid or any stage fails.
    pub async fn submit_review<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &SubmitReviewArgs,
    ) -> Result<(), CliError> {
        let product = match (&args.product, &args.sku) {
            (Some(hex), _) => parse_digest(hex)?,
            (None, Some(sku)) => product_id_for_sku(sku),
            (None, None) => {
                return Err(CliError::InvalidArgument(
                    "one of --product or --sku is required".to_string(),
                ));
            }
        };
        let review_hash = match (&args.review_hash, &args.text) {
            (Some(hex), _) => parse_digest(hex)?,
            (None, Some(text)) => review_content_hash(&product, args.rating, text),
            (None, None) => {
                return Err(CliError::InvalidArgument(
                    "one of --text or --review-hash is required".to_string(),
                ));
            }
        };

        let ledger = self.context.ledger()?;
        let payer = Payer::from_args(&args.wallet, &ledger)?;
        let unsigned = ledger
            .build_submission(
                &payer.wallet(&ledger),
                payer.key_hash(),
                product,
                args.rating,
                review_hash,
            )
            .await?;
        finish(writer, format, &ledger, &payer, unsigned, args.wallet.out.as_deref()).await
    }

    /// Build an upvote, then sign and submit it if a key is given.
    ///
    /// # Errors
    ///
    /// Returns an error if arguments are invalid or any stage fails.
    pub async fn upvote<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &UpvoteArgs,
    ) -> Result<(), CliError> {
        let review: OutputRef = args
            .review
            .parse()
            .map_err(|e| CliError::InvalidArgument(format!("review: {e}")))?;
        let ledger = self.context.ledger()?;
        let payer = Payer::from_args(&args.wallet, &ledger)?;
        let unsigned = ledger
            .upvote_by_ref(&payer.wallet(&ledger), &review, payer.key_hash())
            .await?;
        finish(writer, format, &ledger, &payer, unsigned, args.wallet.out.as_deref()).await
    }
}

async fn finish<W: Write>(
    writer: &mut W,
    format: &OutputFormat,
    ledger: &ReviewLedger<BlockfrostProvider>,
    payer: &Payer,
    unsigned: UnsignedTransaction,
    out: Option<&Path>,
) -> Result<(), CliError> {
    let fee = unsigned.fee();
    let required_signers = unsigned.required_signers().to_vec();
    let mut pending = PendingTransaction::new(unsigned);

    let Payer::Key(key) = payer else {
        save(&pending, out)?;
        return format.write(writer, &TransactionView::from(&pending));
    };

    let missing = pending.sign_with(key).await?;
    if !missing.is_empty() {
        save(&pending, out)?;
        let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();
        return Err(CliError::InvalidArgument(format!(
            "transaction also needs signatures from {}",
            missing.join(", ")
        )));
    }
    pending.assemble()?;
    let result = pending.submit(ledger.provider()).await;
    save(&pending, out)?;
    let tx_hash = result?;
    info!(tx_hash = %tx_hash, "submitted");

    let view = TransactionView {
        tx_hash,
        stage: pending.stage(),
        fee: Some(fee),
        required_signers,
        cbor_hex: None,
    };
    format.write(writer, &view)
}

fn save(pending: &PendingTransaction, out: Option<&Path>) -> Result<(), CliError> {
    match out {
        Some(path) => save_pending(pending, path),
        None => Ok(()),
    }
}
