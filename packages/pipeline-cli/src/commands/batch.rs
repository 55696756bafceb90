//! Process a directory of invoice files.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use invoice_extraction::SUPPORTED_EXTENSIONS;

use super::{build_pipeline, parse_vendor, process_file};

#[derive(Args)]
pub struct BatchArgs {
    /// Directory containing invoice files
    pub input_dir: PathBuf,

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

pub async fn run(args: BatchArgs) -> anyhow::Result<bool> {
    let vendor = parse_vendor(&args.vendor)?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(&args.input_dir)
        .with_context(|| format!("reading {}", args.input_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        println!("No invoice files found in {}", args.input_dir.display());
        return Ok(true);
    }

    println!("Found {} invoice files to process", files.len());
    let pipeline = build_pipeline()?;

    let mut succeeded = 0usize;
    for (index, path) in files.iter().enumerate() {
        println!("[{}/{}] {}", index + 1, files.len(), path.display());
        if process_file(&pipeline, path, vendor, &args.output_dir, &args.errors_dir).await? {
            succeeded += 1;
        }
    }

    println!("Batch complete: {succeeded}/{} successful", files.len());
    Ok(succeeded == files.len())
}
