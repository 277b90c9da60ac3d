//! Assembly and submission of externally signed transactions, and
//! continuation of pending transactions saved with `--out`.

use std::io::Write;

use tracing::info;
use trust_ledger::{
    AssemblyInput, BlockfrostProvider, LedgerProvider, PendingTransaction, PipelineStage,
    SignedTransaction, UnsignedTransaction, WitnessSet, assemble,
};

use super::{Context, load_pending, save_pending};
use crate::cli::{AssembleArgs, ResumeArgs};
use crate::error::CliError;
use crate::output::{OutputFormat, TransactionView};

/// Transaction command executor.
pub struct TransactionCommand {
    context: Context,
}

impl TransactionCommand {
    /// Create a new transaction command.
    #[must_use]
    pub const fn new(context: Context) -> Self {
        Self { context }
    }

    /// Merge witnesses into an unsigned transaction, or check a signed one.
    /// Needs no network access.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or a signature is missing
    /// or invalid.
    pub fn assemble<W: Write>(
        writer: &mut W,
        format: &OutputFormat,
        args: &AssembleArgs,
    ) -> Result<(), CliError> {
        let input = match (&args.signed, &args.unsigned, &args.witnesses) {
            (Some(signed), _, _) => AssemblyInput::Signed(
                hex::decode(signed.trim())
                    .map_err(|e| CliError::InvalidArgument(format!("signed transaction: {e}")))?,
            ),
            (None, Some(unsigned), witnesses) => AssemblyInput::Parts {
                unsigned: UnsignedTransaction::from_hex(unsigned)?,
                witnesses: witnesses
                    .as_deref()
                    .map(WitnessSet::from_hex)
                    .transpose()?
                    .unwrap_or_default(),
            },
            (None, None, _) => {
                return Err(CliError::InvalidArgument(
                    "one of --unsigned or --signed is required".to_string(),
                ));
            }
        };
        let signed = assemble(&input)?;
        let view = TransactionView {
            tx_hash: signed.id(),
            stage: PipelineStage::Assembled,
            fee: None,
            required_signers: Vec::new(),
            cbor_hex: Some(signed.to_hex()),
        };
        format.write(writer, &view)
    }

    /// Load a saved pending transaction, attach witnesses, assemble it once
    /// every signer is covered and, with `--submit`, submit it. The file is
    /// rewritten with the new state, also when submission fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, a witness is rejected,
    /// signatures are still missing at submission, or the ledger rejects
    /// the transaction.
    pub async fn resume<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &ResumeArgs,
    ) -> Result<(), CliError> {
        let mut pending = load_pending(&args.pending)?;
        let witnesses = args
            .witnesses
            .as_deref()
            .map(WitnessSet::from_hex)
            .transpose()?;
        let result = if args.submit {
            let ledger = self.context.ledger()?;
            advance_pending(&mut pending, witnesses.as_ref(), Some(ledger.provider())).await
        } else {
            advance_pending::<BlockfrostProvider>(&mut pending, witnesses.as_ref(), None).await
        };
        save_pending(&pending, &args.pending)?;
        result?;
        format.write(writer, &TransactionView::from(&pending))
    }

    /// Submit a finalized transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails checks or the ledger
    /// rejects it.
    pub async fn submit<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        tx_hex: &str,
    ) -> Result<(), CliError> {
        let signed = SignedTransaction::from_hex(tx_hex)?;
        let mut pending = PendingTransaction::finalized(&signed)?;
        let ledger = self.context.ledger()?;
        let tx_hash = pending.submit(ledger.provider()).await?;
        info!(tx_hash = %tx_hash, "submitted");
        let view = TransactionView {
            tx_hash,
            stage: pending.stage(),
            fee: None,
            required_signers: Vec::new(),
            cbor_hex: None,
        };
        format.write(writer, &view)
    }
}

/// Move a pending transaction as far along the pipeline as it can go.
///
/// Witnesses are attached first. A fully signed transaction is then
/// assembled, and submitted through `provider` when one is given.
///
/// # Errors
///
/// Returns an error if a witness is rejected, submission is requested while
/// signatures are missing, or the provider rejects the transaction.
pub async fn advance_pending<P: LedgerProvider>(
    pending: &mut PendingTransaction,
    witnesses: Option<&WitnessSet>,
    provider: Option<&P>,
) -> Result<(), CliError> {
    if let Some(witnesses) = witnesses {
        let missing = pending.attach_witnesses(witnesses)?;
        info!(tx_hash = %pending.id(), missing = missing.len(), "attached witnesses");
    }
    if pending.stage() == PipelineStage::Signed {
        pending.assemble()?;
    }
    let Some(provider) = provider else {
        return Ok(());
    };
    if pending.stage() == PipelineStage::Built {
        let missing: Vec<String> = pending
            .missing_signers()
            .iter()
            .map(ToString::to_string)
            .collect();
        return Err(CliError::InvalidArgument(format!(
            "cannot submit: transaction still needs signatures from {}",
            missing.join(", ")
        )));
    }
    let tx_hash = pending.submit(provider).await?;
    info!(tx_hash = %tx_hash, "submitted");
    Ok(())
}
