//! Pipeline orchestrator.
//!
//! A strictly sequential state machine:
//! `Preprocessing -> Prompting -> Extracting -> Validating -> DoneSuccess | DoneFailure`.
//! Any component failure short-circuits to `DoneFailure` carrying the
//! accumulated errors. Instances hold no per-run state, so many runs can
//! execute concurrently; backpressure belongs to the invocation layer.

use std::fmt;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::gateway::{ExtractionGateway, GatewayResponse};
use crate::preprocess::ImagePreprocessor;
use crate::prompts::build_extraction_prompt;
use crate::traits::bus::MessageBus;
use crate::traits::store::{split_object_uri, ObjectStore};
use crate::traits::tabular::TabularStore;
use crate::types::config::PipelineConfig;
use crate::types::invoice::{ExtractedInvoice, VendorType};
use crate::types::messages::{InvoiceConvertedMessage, InvoiceExtractedMessage, InvoiceFailedMessage};
use crate::types::result::ExtractionResult;
use crate::validate::{check_business_rules, parse_invoice, rule_warnings, score, SchemaOutcome};

/// Stages of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Preprocessing,
    Prompting,
    Extracting,
    Validating,
    DoneSuccess,
    DoneFailure,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Preprocessing => "preprocessing",
            PipelineStage::Prompting => "prompting",
            PipelineStage::Extracting => "extracting",
            PipelineStage::Validating => "validating",
            PipelineStage::DoneSuccess => "done_success",
            PipelineStage::DoneFailure => "done_failure",
        };
        f.write_str(name)
    }
}

/// Sequences preprocessing, prompting, extraction, validation, and
/// persistence into a single deterministic outcome.
pub struct Pipeline<S, B, T> {
    gateway: ExtractionGateway,
    preprocessor: ImagePreprocessor,
    storage: S,
    bus: B,
    tabular: T,
    config: PipelineConfig,
}

struct RunContext<'a> {
    source_file: &'a str,
    vendor: VendorType,
    started: Instant,
}

impl<S, B, T> Pipeline<S, B, T>
where
    S: ObjectStore,
    B: MessageBus,
    T: TabularStore,
{
    /// Build a pipeline from an explicit configuration.
    pub fn new(
        gateway: ExtractionGateway,
        storage: S,
        bus: B,
        tabular: T,
        config: PipelineConfig,
    ) -> Self {
        let preprocessor = ImagePreprocessor::new().with_max_dimension(config.max_image_dimension);
        Self {
            gateway,
            preprocessor,
            storage,
            bus,
            tabular,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline for an input message, resolving page references
    /// through the object store.
    pub async fn handle_message(&self, message: &InvoiceConvertedMessage) -> ExtractionResult {
        let ctx = RunContext {
            source_file: &message.source_file,
            vendor: message.vendor_type,
            started: Instant::now(),
        };

        let mut inputs = Vec::with_capacity(message.converted_files.len());
        for reference in &message.converted_files {
            let Some((bucket, path)) = split_object_uri(reference) else {
                return self
                    .fail(
                        &ctx,
                        None,
                        vec![format!("invalid object reference: {reference}")],
                        Vec::new(),
                        None,
                    )
                    .await;
            };
            match self.storage.read(bucket, path).await {
                Ok(bytes) => inputs.push(bytes),
                Err(error) => {
                    return self
                        .fail(
                            &ctx,
                            None,
                            vec![format!("failed to read {reference}: {error}")],
                            Vec::new(),
                            None,
                        )
                        .await;
                }
            }
        }

        self.run_inner(ctx, inputs).await
    }

    /// Run the pipeline over raw input documents (CLI entry point).
    pub async fn run(
        &self,
        source_file: &str,
        vendor: VendorType,
        inputs: Vec<Vec<u8>>,
    ) -> ExtractionResult {
        let ctx = RunContext {
            source_file,
            vendor,
            started: Instant::now(),
        };
        self.run_inner(ctx, inputs).await
    }

    async fn run_inner(&self, ctx: RunContext<'_>, inputs: Vec<Vec<u8>>) -> ExtractionResult {
        info!(
            source_file = ctx.source_file,
            vendor = %ctx.vendor,
            inputs = inputs.len(),
            "pipeline run started"
        );

        // PREPROCESSING
        info!(stage = %PipelineStage::Preprocessing, source_file = ctx.source_file, "stage");
        let mut pages = Vec::new();
        for (index, input) in inputs.iter().enumerate() {
            match self.preprocessor.process(input) {
                Ok(processed) => pages.extend(processed.pages),
                Err(error) => {
                    return self
                        .fail(
                            &ctx,
                            None,
                            vec![format!(
                                "image processing failed for input {}: {error}",
                                index + 1
                            )],
                            Vec::new(),
                            None,
                        )
                        .await;
                }
            }
        }
        if pages.is_empty() {
            return self
                .fail(
                    &ctx,
                    None,
                    vec!["no input pages to extract".to_string()],
                    Vec::new(),
                    None,
                )
                .await;
        }
        for (index, page) in pages.iter_mut().enumerate() {
            page.page_number = index + 1;
        }

        // PROMPTING
        info!(stage = %PipelineStage::Prompting, vendor = %ctx.vendor, "stage");
        let prompt = match build_extraction_prompt(ctx.vendor) {
            Ok(prompt) => prompt,
            Err(error) => {
                return self
                    .fail(
                        &ctx,
                        None,
                        vec![format!("prompt build failed: {error}")],
                        Vec::new(),
                        None,
                    )
                    .await;
            }
        };

        // EXTRACTING
        info!(stage = %PipelineStage::Extracting, pages = pages.len(), "stage");
        let mut response = self.gateway.extract(&prompt, &pages).await;
        if !response.success {
            let error = response
                .error
                .take()
                .unwrap_or_else(|| "unknown provider error".to_string());
            return self
                .fail(
                    &ctx,
                    Some(&response.provider),
                    vec![format!("LLM extraction failed: {error}")],
                    Vec::new(),
                    None,
                )
                .await;
        }

        // VALIDATING
        info!(stage = %PipelineStage::Validating, provider = %response.provider, "stage");
        let mut content = response.content.clone().unwrap_or_default();
        let mut outcome = parse_invoice(&content);

        // A parse error is never retried against the same provider, but one
        // fallback re-prompt may still salvage the run.
        if matches!(outcome, SchemaOutcome::ParseError(_))
            && response.provider == self.gateway.primary_name()
            && self.gateway.has_fallback()
        {
            warn!(
                provider = %response.provider,
                "unparseable response, re-prompting fallback"
            );
            if let Some(fallback_response) = self.gateway.extract_via_fallback(&prompt, &pages).await
            {
                if fallback_response.success {
                    response = fallback_response;
                    content = response.content.clone().unwrap_or_default();
                    outcome = parse_invoice(&content);
                }
            }
        }

        let invoice = match outcome {
            SchemaOutcome::Valid(invoice) => invoice,
            SchemaOutcome::Invalid(errors) => {
                return self
                    .fail(&ctx, Some(&response.provider), errors, Vec::new(), Some(content))
                    .await;
            }
            SchemaOutcome::ParseError(error) => {
                return self
                    .fail(
                        &ctx,
                        Some(&response.provider),
                        vec![error],
                        Vec::new(),
                        Some(content),
                    )
                    .await;
            }
        };

        let violations = check_business_rules(&invoice);
        let warnings = rule_warnings(&invoice);
        if !violations.is_empty() {
            return self
                .fail(&ctx, Some(&response.provider), violations, warnings, Some(content))
                .await;
        }

        let confidence = score(&invoice, response.provider_confidence);

        // DONE_SUCCESS: persist, then emit. Persistence errors are caught
        // here and re-signalled as a failure so the caller can retry the run.
        if let Err(error) = self
            .persist(&invoice, &response, confidence, ctx.source_file)
            .await
        {
            return self
                .fail(
                    &ctx,
                    Some(&response.provider),
                    vec![format!("persistence failed: {error}")],
                    warnings,
                    Some(content),
                )
                .await;
        }

        let extracted_data = match serde_json::to_value(&invoice) {
            Ok(value) => value,
            Err(error) => {
                return self
                    .fail(
                        &ctx,
                        Some(&response.provider),
                        vec![format!("failed to serialize invoice: {error}")],
                        warnings,
                        Some(content),
                    )
                    .await;
            }
        };
        let event = InvoiceExtractedMessage {
            source_file: ctx.source_file.to_string(),
            vendor_type: ctx.vendor,
            extraction_model: response.provider.clone(),
            extraction_latency_ms: response.latency_ms,
            confidence_score: confidence,
            extracted_data,
            event_time: Utc::now(),
        };
        if let Err(error) = self.publish(&self.config.extracted_topic, &event).await {
            return self
                .fail(
                    &ctx,
                    Some(&response.provider),
                    vec![format!("event publish failed: {error}")],
                    warnings,
                    Some(content),
                )
                .await;
        }

        let latency_ms = ctx.started.elapsed().as_millis() as u64;
        info!(
            stage = %PipelineStage::DoneSuccess,
            invoice_id = invoice.invoice_id(),
            provider = %response.provider,
            confidence,
            latency_ms,
            "pipeline run succeeded"
        );

        ExtractionResult {
            invoice: Some(invoice),
            success: true,
            provider: response.provider,
            confidence,
            latency_ms,
            tokens_used: response.tokens_used,
            errors: Vec::new(),
            warnings,
            raw_response: Some(content),
            input_file: Some(ctx.source_file.to_string()),
        }
    }

    /// Short-circuit to `DoneFailure`: emit the error record and build the
    /// failure result. Publish problems are logged, never raised.
    async fn fail(
        &self,
        ctx: &RunContext<'_>,
        provider: Option<&str>,
        errors: Vec<String>,
        warnings: Vec<String>,
        raw_response: Option<String>,
    ) -> ExtractionResult {
        let latency_ms = ctx.started.elapsed().as_millis() as u64;
        warn!(
            stage = %PipelineStage::DoneFailure,
            source_file = ctx.source_file,
            errors = ?errors,
            "pipeline run failed"
        );

        let record = InvoiceFailedMessage {
            source_file: ctx.source_file.to_string(),
            vendor_type: ctx.vendor,
            provider: provider.map(|p| p.to_string()),
            errors: errors.clone(),
            event_time: Utc::now(),
        };
        if let Err(error) = self.publish(&self.config.failed_topic, &record).await {
            warn!(error = %error, "failed to publish error record");
        }

        let mut result = ExtractionResult::failure(
            provider.unwrap_or_else(|| self.gateway.primary_name()),
            errors,
        )
        .with_input_file(ctx.source_file)
        .with_latency_ms(latency_ms)
        .with_warnings(warnings);
        result.raw_response = raw_response;
        result
    }

    async fn publish<M: serde::Serialize>(&self, topic: &str, message: &M) -> Result<String> {
        let payload = serde_json::to_value(message)?;
        self.bus.publish(topic, payload).await
    }

    /// Write invoice and line item rows, suppressing duplicates with a
    /// check-then-insert probe on the invoice id.
    async fn persist(
        &self,
        invoice: &ExtractedInvoice,
        response: &GatewayResponse,
        confidence: f64,
        source_file: &str,
    ) -> Result<()> {
        let dataset = &self.config.dataset;

        let exists = self
            .tabular
            .row_exists(dataset, &self.config.invoices_table, invoice.invoice_id())
            .await?;
        if exists {
            info!(
                invoice_id = invoice.invoice_id(),
                "invoice already stored, skipping insert"
            );
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "id": Uuid::new_v4().to_string(),
            "invoice_id": invoice.invoice_id(),
            "vendor_name": invoice.vendor_name(),
            "vendor_type": invoice.vendor_type().as_str(),
            "invoice_date": invoice.invoice_date().to_string(),
            "due_date": invoice.due_date().to_string(),
            "currency": invoice.currency().as_str(),
            "subtotal": invoice.subtotal().to_f64().unwrap_or_default(),
            "tax_amount": invoice.tax_amount().to_f64().unwrap_or_default(),
            "commission_rate": invoice.commission_rate().to_f64().unwrap_or_default(),
            "commission_amount": invoice.commission_amount().to_f64().unwrap_or_default(),
            "total_amount": invoice.total_amount().to_f64().unwrap_or_default(),
            "source_file": source_file,
            "extraction_model": response.provider,
            "extraction_latency_ms": response.latency_ms,
            "confidence_score": confidence,
            "created_at": &now,
        });
        self.tabular
            .insert_row(dataset, &self.config.invoices_table, row)
            .await?;

        for item in invoice.line_items() {
            let row = json!({
                "id": Uuid::new_v4().to_string(),
                "invoice_id": invoice.invoice_id(),
                "description": item.description(),
                "quantity": item.quantity(),
                "unit_price": item.unit_price().to_f64().unwrap_or_default(),
                "amount": item.amount().to_f64().unwrap_or_default(),
                "created_at": &now,
            });
            self.tabular
                .insert_row(dataset, &self.config.line_items_table, row)
                .await?;
        }

        Ok(())
    }
}
