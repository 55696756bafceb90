//! CLI subcommands and shared plumbing.

pub mod batch;
pub mod process;

use std::path::Path;

use anyhow::Context;
use serde_json::json;

use invoice_extraction::{
    ExtractionGateway, ExtractionResult, GeminiProvider, MemoryMessageBus, MemoryObjectStore,
    MemoryTabularStore, OpenRouterProvider, Pipeline, PipelineConfig, VendorType,
};

/// Local pipeline: real providers, in-memory collaborators.
pub type LocalPipeline = Pipeline<MemoryObjectStore, MemoryMessageBus, MemoryTabularStore>;

/// Build a pipeline from environment credentials.
///
/// `GOOGLE_API_KEY` is required; `OPENROUTER_API_KEY` enables the fallback.
pub fn build_pipeline() -> anyhow::Result<LocalPipeline> {
    let config = PipelineConfig::from_env()?;

    let primary = GeminiProvider::from_env()
        .context("primary provider needs GOOGLE_API_KEY")?
        .with_model(&config.gemini_model);

    let mut gateway = ExtractionGateway::new(Box::new(primary))
        .with_retry_policy(config.retry)
        .with_timeout(config.request_timeout);

    match OpenRouterProvider::from_env() {
        Ok(fallback) => {
            gateway = gateway.with_fallback(Box::new(fallback.with_model(&config.openrouter_model)));
        }
        Err(_) => {
            tracing::info!("OPENROUTER_API_KEY not set, running without fallback provider");
        }
    }

    Ok(Pipeline::new(
        gateway,
        MemoryObjectStore::new(),
        MemoryMessageBus::new(),
        MemoryTabularStore::new(),
        config,
    ))
}

/// Run one file through the pipeline and write the result or error report.
pub async fn process_file(
    pipeline: &LocalPipeline,
    input: &Path,
    vendor: VendorType,
    output_dir: &Path,
    errors_dir: &Path,
) -> anyhow::Result<bool> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;

    let result = pipeline
        .run(&input.display().to_string(), vendor, vec![bytes])
        .await;

    if result.success {
        save_result(&result, output_dir)?;
        if let Some(invoice) = &result.invoice {
            println!(
                "  ok: {} via {} ({}ms, confidence {:.2})",
                invoice.invoice_id(),
                result.provider,
                result.latency_ms,
                result.confidence
            );
        }
        Ok(true)
    } else {
        save_error(&result, errors_dir, input)?;
        println!(
            "  failed: {}",
            result.errors.first().map(String::as_str).unwrap_or("unknown error")
        );
        Ok(false)
    }
}

/// Write a successful extraction as `{invoice_id}.json`.
fn save_result(result: &ExtractionResult, output_dir: &Path) -> anyhow::Result<()> {
    let Some(invoice) = &result.invoice else {
        return Ok(());
    };
    std::fs::create_dir_all(output_dir)?;

    let payload = json!({
        "invoice": invoice,
        "metadata": {
            "provider": result.provider,
            "confidence": result.confidence,
            "latency_ms": result.latency_ms,
            "tokens_used": result.tokens_used,
            "warnings": result.warnings,
            "input_file": result.input_file,
        }
    });

    let path = output_dir.join(format!("{}.json", invoice.invoice_id()));
    std::fs::write(&path, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write a failure report as `{input_stem}_error.json`.
fn save_error(result: &ExtractionResult, errors_dir: &Path, input: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(errors_dir)?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());

    let payload = json!({
        "input_file": result.input_file,
        "errors": result.errors,
        "warnings": result.warnings,
        "provider": result.provider,
        "latency_ms": result.latency_ms,
        "raw_response": result.raw_response,
    });

    let path = errors_dir.join(format!("{stem}_error.json"));
    std::fs::write(&path, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Parse the `--vendor` hint.
pub fn parse_vendor(raw: &str) -> anyhow::Result<VendorType> {
    raw.parse()
        .map_err(|e: String| anyhow::anyhow!("{e} (expected one of: ubereats, doordash, grubhub, ifood, rappi, other)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_hint_parses_known_platforms() {
        assert_eq!(parse_vendor("ubereats").unwrap(), VendorType::Ubereats);
        assert_eq!(parse_vendor("IFOOD").unwrap(), VendorType::Ifood);
        assert!(parse_vendor("lieferando").is_err());
    }
}
