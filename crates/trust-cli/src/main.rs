//! TrustChain CLI binary entrypoint.
//!
//! This is the main entry point for the `trustchain` command-line tool.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use trust_cli::cli::{Cli, Commands};
use trust_cli::commands::{Context, QueryCommand, ReviewCommand, TransactionCommand};
use trust_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = e.hint() {
                eprintln!("Hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), trust_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let context = Context::from_cli(&cli);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Balance { cbor_hex } => {
            QueryCommand::balance(&mut stdout, &format, &cbor_hex)?;
        }
        Commands::ProductId { sku } => {
            QueryCommand::product_id(&mut stdout, &format, &sku)?;
        }
        Commands::ScriptAddress => {
            let cmd = QueryCommand::new(context);
            cmd.script_address(&mut stdout, &format)?;
        }
        Commands::Reviews(args) => {
            let cmd = QueryCommand::new(context);
            cmd.reviews(&mut stdout, &format, &args).await?;
        }
        Commands::Reputation { key_hash } => {
            let cmd = QueryCommand::new(context);
            cmd.reputation(&mut stdout, &format, &key_hash).await?;
        }
        Commands::Tx { hash } => {
            let cmd = QueryCommand::new(context);
            cmd.transaction(&mut stdout, &format, &hash).await?;
        }
        Commands::SubmitReview(args) => {
            let cmd = ReviewCommand::new(context);
            cmd.submit_review(&mut stdout, &format, &args).await?;
        }
        Commands::Upvote(args) => {
            let cmd = ReviewCommand::new(context);
            cmd.upvote(&mut stdout, &format, &args).await?;
        }
        Commands::Assemble(args) => {
            TransactionCommand::assemble(&mut stdout, &format, &args)?;
        }
        Commands::Resume(args) => {
            let cmd = TransactionCommand::new(context);
            cmd.resume(&mut stdout, &format, &args).await?;
        }
        Commands::Submit { tx_hex } => {
            let cmd = TransactionCommand::new(context);
            cmd.submit(&mut stdout, &format, &tx_hex).await?;
        }
    }

    Ok(())
}
