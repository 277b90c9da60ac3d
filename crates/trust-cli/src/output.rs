//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;
use trust_ledger::{
    Address, Digest32, KeyHash, Lovelace, Network, PendingTransaction, PipelineStage,
    ReviewUtxo, ScriptHash, SignedTransaction, TransactionInfo, TxHash, UnsignedTransaction,
};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Decoded wallet balance.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    /// Balance in lovelace.
    pub lovelace: u64,
    /// Balance in ADA, six decimals.
    pub ada: String,
}

impl From<Lovelace> for BalanceView {
    fn from(amount: Lovelace) -> Self {
        Self {
            lovelace: amount.lovelace(),
            ada: format!("{}.{:06}", amount.whole_ada(), amount.fractional_lovelace()),
        }
    }
}

impl TableDisplay for BalanceView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Balance:  {} ADA ({} lovelace)", self.ada, self.lovelace)?;
        Ok(())
    }
}

/// Where reviews are locked.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptAddressView {
    /// Network.
    pub network: Network,
    /// Script address.
    pub address: Address,
    /// Validator hash, when the validator is loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_hash: Option<ScriptHash>,
}

impl TableDisplay for ScriptAddressView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Network:      {}", self.network)?;
        writeln!(writer, "Address:      {}", self.address)?;
        match &self.script_hash {
            Some(hash) => writeln!(writer, "Script hash:  {hash}")?,
            None => writeln!(writer, "Script hash:  (validator not loaded)")?,
        }
        Ok(())
    }
}

/// A list of live reviews.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ReviewList(pub Vec<ReviewUtxo>);

impl TableDisplay for ReviewList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.0.is_empty() {
            writeln!(writer, "No reviews found.")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<20}  {:<6}  {:>7}  {:>5}  {:<8}  {:<16}",
            "OUTPUT", "RATING", "UPVOTES", "FLAGS", "VERIFIED", "REVIEWER"
        )?;
        writeln!(writer, "{}", "─".repeat(72))?;
        for review in &self.0 {
            let datum = &review.datum;
            writeln!(
                writer,
                "{:<20}  {:<6}  {:>7}  {:>5}  {:<8}  {:<16}",
                truncate(&review.out_ref.to_string(), 20),
                "★".repeat(usize::from(datum.rating)),
                datum.upvotes,
                datum.flags,
                if datum.verified { "yes" } else { "no" },
                truncate(&datum.reviewer.to_hex(), 16),
            )?;
        }
        writeln!(writer)?;
        writeln!(writer, "Total: {} review(s)", self.0.len())?;
        Ok(())
    }
}

/// Reputation score of a reviewer.
#[derive(Debug, Clone, Serialize)]
pub struct ReputationView {
    /// Reviewer key hash.
    pub reviewer: KeyHash,
    /// Score.
    pub score: u64,
}

impl TableDisplay for ReputationView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Reviewer:    {}", self.reviewer)?;
        writeln!(writer, "Reputation:  {}", self.score)?;
        Ok(())
    }
}

/// A transaction produced by a command.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    /// Transaction id.
    pub tx_hash: TxHash,
    /// Pipeline stage reached.
    pub stage: PipelineStage,
    /// Fee, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Lovelace>,
    /// Signers whose witnesses are required.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_signers: Vec<KeyHash>,
    /// Transaction bytes, hex. Absent once submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cbor_hex: Option<String>,
}

impl From<&PendingTransaction> for TransactionView {
    /// Signers listed are the ones still missing. The bytes shown are what
    /// the next step needs: unsigned while signatures are missing, signed
    /// once assembled.
    fn from(pending: &PendingTransaction) -> Self {
        let cbor_hex = match pending.stage() {
            PipelineStage::Built => pending.unsigned().map(UnsignedTransaction::to_hex),
            PipelineStage::Assembled => pending.signed().map(SignedTransaction::to_hex),
            PipelineStage::Signed | PipelineStage::Submitted => None,
        };
        Self {
            tx_hash: pending.id(),
            stage: pending.stage(),
            fee: pending.unsigned().map(UnsignedTransaction::fee),
            required_signers: pending.missing_signers(),
            cbor_hex,
        }
    }
}

impl TableDisplay for TransactionView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Transaction:  {}", self.tx_hash)?;
        writeln!(writer, "Stage:        {}", self.stage)?;
        if let Some(fee) = &self.fee {
            writeln!(writer, "Fee:          {fee}")?;
        }
        if !self.required_signers.is_empty() {
            writeln!(writer, "Signers:")?;
            for signer in &self.required_signers {
                writeln!(writer, "  {signer}")?;
            }
        }
        if let Some(hex) = &self.cbor_hex {
            writeln!(writer)?;
            writeln!(writer, "{hex}")?;
        }
        Ok(())
    }
}

/// Transaction details from the ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct TransactionDetails(pub TransactionInfo);

impl TableDisplay for TransactionDetails {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let info = &self.0;
        writeln!(writer, "Transaction:  {}", info.hash)?;
        match (info.block_height, info.block_datetime()) {
            (Some(height), Some(time)) => {
                writeln!(writer, "Block:        {height} ({})", time.to_rfc3339())?;
            }
            (Some(height), None) => writeln!(writer, "Block:        {height}")?,
            _ => writeln!(writer, "Block:        (pending)")?,
        }
        writeln!(writer, "Fee:          {}", info.fees)?;
        writeln!(writer, "Size:         {} bytes", info.size)?;
        writeln!(
            writer,
            "Scripts:      {}",
            if info.valid_contract { "valid" } else { "failed" }
        )?;
        Ok(())
    }
}

/// Product id for a SKU.
#[derive(Debug, Clone, Serialize)]
pub struct ProductIdView {
    /// SKU.
    pub sku: String,
    /// Derived product id.
    pub product_id: Digest32,
}

impl TableDisplay for ProductIdView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "SKU:         {}", self.sku)?;
        writeln!(writer, "Product id:  {}", self.product_id)?;
        Ok(())
    }
}

/// Simple message output.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Message text.
    pub message: String,
    /// Whether this is a success message.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub success: bool,
}

impl Message {
    /// Create a success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }
}

impl TableDisplay for Message {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.success {
            writeln!(writer, "✓ {}", self.message)?;
        } else {
            writeln!(writer, "{}", self.message)?;
        }
        Ok(())
    }
}

/// Truncate a string to a maximum length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
