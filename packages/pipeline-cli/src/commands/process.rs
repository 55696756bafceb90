//! Process a single invoice file.

use std::path::PathBuf;

use clap::Args;

use super::{build_pipeline, parse_vendor, process_file};

#[derive(Args)]
pub struct ProcessArgs {
    /// Input invoice file (TIFF, PNG, or JPEG)
    pub input: PathBuf,

    /// Vendor hint for prompt selection
    #[arg(long, default_value = "ubereats")]
    pub vendor: String,

    /// Directory for successful extraction JSON
    #[arg(long, default_value = "data/output")]
    pub output_dir: PathBuf,

    /// Directory for failure reports
    #[arg(long, default_value = "data/errors")]
    pub errors_dir: PathBuf,
}

pub async fn run(args: ProcessArgs) -> anyhow::Result<bool> {
    let vendor = parse_vendor(&args.vendor)?;
    let pipeline = build_pipeline()?;

    println!("Processing: {}", args.input.display());
    process_file(&pipeline, &args.input, vendor, &args.output_dir, &args.errors_dir).await
}
