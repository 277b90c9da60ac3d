//! Read-only commands: balances, reviews, reputation, transaction details.

use std::io::Write;

use trust_ledger::{
    Digest32, KeyHash, LedgerError, TxHash, ValidatorScript, decode_balance_hex,
    product_id_for_sku,
};

use super::Context;
use crate::cli::ReviewsArgs;
use crate::error::CliError;
use crate::output::{
    BalanceView, OutputFormat, ProductIdView, ReputationView, ReviewList, ScriptAddressView,
    TransactionDetails,
};

/// Query command executor.
pub struct QueryCommand {
    context: Context,
}

impl QueryCommand {
    /// Create a new query command.
    #[must_use]
    pub const fn new(context: Context) -> Self {
        Self { context }
    }

    /// Decode a wallet balance. Needs no network access.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn balance<W: Write>(
        writer: &mut W,
        format: &OutputFormat,
        cbor_hex: &str,
    ) -> Result<(), CliError> {
        format.write(writer, &BalanceView::from(decode_balance_hex(cbor_hex)))
    }

    /// Derive a product id. Needs no network access.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn product_id<W: Write>(
        writer: &mut W,
        format: &OutputFormat,
        sku: &str,
    ) -> Result<(), CliError> {
        let view = ProductIdView {
            sku: sku.to_string(),
            product_id: product_id_for_sku(sku),
        };
        format.write(writer, &view)
    }

    /// Show the script address from configuration alone.
    ///
    /// # Errors
    ///
    /// Returns an error if neither a blueprint nor an address is configured.
    pub fn script_address<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let config = self.context.config()?;
        let script = config
            .blueprint_path
            .as_ref()
            .map(|path| ValidatorScript::from_blueprint_file(path, config.validator_title.as_deref()))
            .transpose()?;
        let address = match (&config.script_address, &script) {
            (Some(address), _) => address.clone(),
            (None, Some(script)) => script.address(config.network),
            (None, None) => {
                return Err(CliError::Config(
                    "set script_address or blueprint_path in the configuration".to_string(),
                ));
            }
        };
        let view = ScriptAddressView {
            network: config.network,
            address,
            script_hash: script.map(|s| s.hash()),
        };
        format.write(writer, &view)
    }

    /// List reviews of a product or by a reviewer.
    ///
    /// # Errors
    ///
    /// Returns an error if arguments are invalid or the ledger is unreachable.
    pub async fn reviews<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &ReviewsArgs,
    ) -> Result<(), CliError> {
        let ledger = self.context.ledger()?;
        let reviews = if let Some(reviewer) = &args.reviewer {
            ledger.reviews_by_reviewer(&parse_key_hash(reviewer)?).await?
        } else {
            let product = match (&args.product, &args.sku) {
                (Some(hex), _) => parse_digest(hex)?,
                (None, Some(sku)) => product_id_for_sku(sku),
                (None, None) => {
                    return Err(CliError::InvalidArgument(
                        "one of --product, --sku or --reviewer is required".to_string(),
                    ));
                }
            };
            ledger.reviews_for_product(&product).await?
        };
        format.write(writer, &ReviewList(reviews))
    }

    /// Show a reviewer's reputation.
    ///
    /// # Errors
    ///
    /// Returns an error if the key hash is invalid.
    pub async fn reputation<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        key_hash: &str,
    ) -> Result<(), CliError> {
        let reviewer = parse_key_hash(key_hash)?;
        let ledger = self.context.ledger()?;
        let view = ReputationView {
            reviewer,
            score: ledger.reputation(&reviewer).await,
        };
        format.write(writer, &view)
    }

    /// Show transaction details.
    ///
    /// # Errors
    ///
    /// Returns an error if the hash is invalid or the transaction is unknown.
    pub async fn transaction<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        hash: &str,
    ) -> Result<(), CliError> {
        let hash: TxHash = hash
            .parse()
            .map_err(|e: LedgerError| CliError::InvalidArgument(format!("transaction hash: {e}")))?;
        let ledger = self.context.ledger()?;
        let info = ledger.transaction_details(&hash).await?;
        format.write(writer, &TransactionDetails(info))
    }
}

pub(super) fn parse_key_hash(s: &str) -> Result<KeyHash, CliError> {
    s.parse()
        .map_err(|e: LedgerError| CliError::InvalidArgument(format!("key hash: {e}")))
}

pub(super) fn parse_digest(s: &str) -> Result<Digest32, CliError> {
    s.parse()
        .map_err(|e: LedgerError| CliError::InvalidArgument(format!("digest: {e}")))
}
