//! CLI for the invoice extraction pipeline.
//!
//! Thin boundary over the library: reads files, runs the pipeline, writes
//! per-invoice JSON results or error reports. Exit code 0 on success, 1 on
//! any extraction or validation failure.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, process};

/// Extract structured data from scanned invoice images.
#[derive(Parser)]
#[command(name = "invoice-extract")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single invoice file
    Process(process::ProcessArgs),

    /// Process every invoice file in a directory
    Batch(batch::BatchArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let all_succeeded = match cli.command {
        Commands::Process(args) => process::run(args).await?,
        Commands::Batch(args) => batch::run(args).await?,
    };

    if !all_succeeded {
        std::process::exit(1);
    }
    Ok(())
}
