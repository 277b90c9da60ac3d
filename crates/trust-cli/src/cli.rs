//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// TrustChain CLI - on-chain product reviews.
#[derive(Parser, Debug, Clone)]
#[command(name = "trustchain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file.
    #[arg(short, long, env = "TRUSTCHAIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Network to use (mainnet, preprod, preview).
    #[arg(short, long, env = "NETWORK")]
    pub network: Option<String>,

    /// Blockfrost project id.
    #[arg(long, env = "BLOCKFROST_API_KEY", hide_env_values = true)]
    pub blockfrost_key: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[derive(Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Decode a CBOR wallet balance.
    Balance {
        /// Hex-encoded CBOR balance as returned by a wallet.
        cbor_hex: String,
    },

    /// Show the review script address.
    ScriptAddress,

    /// List live reviews.
    Reviews(ReviewsArgs),

    /// Show a reviewer's reputation score.
    Reputation {
        /// Reviewer key hash (hex).
        key_hash: String,
    },

    /// Build, and optionally sign and submit, a new review.
    SubmitReview(SubmitReviewArgs),

    /// Build, and optionally sign and submit, an upvote.
    Upvote(UpvoteArgs),

    /// Merge witnesses into an unsigned transaction.
    Assemble(AssembleArgs),

    /// Continue a transaction saved with `--out`.
    Resume(ResumeArgs),

    /// Submit a finalized transaction.
    Submit {
        /// Hex-encoded signed transaction.
        tx_hex: String,
    },

    /// Show transaction details.
    Tx {
        /// Transaction hash (hex).
        hash: String,
    },

    /// Derive the product id for a SKU.
    ProductId {
        /// Product SKU.
        sku: String,
    },
}

/// Arguments for the reviews command.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ReviewsArgs {
    /// Product id (hex).
    #[arg(long)]
    pub product: Option<String>,

    /// Product SKU; the product id is derived from it.
    #[arg(long)]
    pub sku: Option<String>,

    /// Reviewer key hash (hex).
    #[arg(long)]
    pub reviewer: Option<String>,
}

/// Who pays for and signs a transaction.
#[derive(Args, Debug, Clone)]
pub struct WalletArgs {
    /// Signing key file (text envelope). When given, the transaction is
    /// signed, assembled and submitted.
    #[arg(long, conflicts_with_all = ["wallet", "key_hash"])]
    pub signing_key: Option<PathBuf>,

    /// Wallet address paying fees (bech32 or hex), for external signing.
    #[arg(long, requires = "key_hash")]
    pub wallet: Option<String>,

    /// Key hash of the signer, for external signing.
    #[arg(long, requires = "wallet")]
    pub key_hash: Option<String>,

    /// Write the pending transaction as JSON to this file.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Arguments for the submit-review command.
#[derive(Args, Debug, Clone)]
pub struct SubmitReviewArgs {
    /// Product SKU.
    #[arg(long, conflicts_with = "product")]
    pub sku: Option<String>,

    /// Product id (hex).
    #[arg(long, required_unless_present = "sku")]
    pub product: Option<String>,

    /// Star rating, 1 to 5.
    #[arg(short, long)]
    pub rating: u8,

    /// Review text; its digest is stored on chain.
    #[arg(long, conflicts_with = "review_hash")]
    pub text: Option<String>,

    /// Precomputed review content digest (hex).
    #[arg(long, required_unless_present = "text")]
    pub review_hash: Option<String>,

    /// Signing and payment options.
    #[command(flatten)]
    pub wallet: WalletArgs,
}

/// Arguments for the upvote command.
#[derive(Args, Debug, Clone)]
pub struct UpvoteArgs {
    /// Review output reference, `tx_hash#index`.
    #[arg(long)]
    pub review: String,

    /// Signing and payment options.
    #[command(flatten)]
    pub wallet: WalletArgs,
}

/// Arguments for the assemble command.
#[derive(Args, Debug, Clone)]
pub struct AssembleArgs {
    /// Hex-encoded unsigned transaction.
    #[arg(long, required_unless_present = "signed", conflicts_with = "signed")]
    pub unsigned: Option<String>,

    /// Hex-encoded witness set from the signer.
    #[arg(long, requires = "unsigned")]
    pub witnesses: Option<String>,

    /// Hex-encoded transaction that is already signed.
    #[arg(long)]
    pub signed: Option<String>,
}

/// Arguments for the resume command.
#[derive(Args, Debug, Clone)]
pub struct ResumeArgs {
    /// Pending transaction file written by `--out`. Updated in place.
    #[arg(long)]
    pub pending: PathBuf,

    /// Hex-encoded witness set from the signer.
    #[arg(long)]
    pub witnesses: Option<String>,

    /// Submit once the transaction is assembled.
    #[arg(long)]
    pub submit: bool,
}
