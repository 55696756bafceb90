//! Pipeline result types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::invoice::ExtractedInvoice;

/// Outcome of one full pipeline run.
///
/// Created once per invocation and handed to a collaborator; nothing is
/// shared or cached across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Extracted invoice (None if the run failed).
    pub invoice: Option<ExtractedInvoice>,

    /// Whether extraction and validation both succeeded.
    pub success: bool,

    /// Identifier of the provider that produced the response.
    pub provider: String,

    /// Overall confidence score (0.0 to 1.0).
    pub confidence: f64,

    /// Wall-clock processing time in milliseconds.
    pub latency_ms: u64,

    /// Total tokens consumed, when the provider reports them.
    pub tokens_used: Option<u32>,

    /// Error messages accumulated along the run.
    pub errors: Vec<String>,

    /// Non-fatal warnings.
    pub warnings: Vec<String>,

    /// Raw provider response, kept for auditing.
    pub raw_response: Option<String>,

    /// Reference to the original input (file path or object URI).
    pub input_file: Option<String>,
}

impl ExtractionResult {
    /// Build a failure result carrying accumulated errors.
    pub fn failure(provider: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            invoice: None,
            success: false,
            provider: provider.into(),
            confidence: 0.0,
            latency_ms: 0,
            tokens_used: None,
            errors,
            warnings: Vec::new(),
            raw_response: None,
            input_file: None,
        }
    }

    pub fn with_input_file(mut self, input_file: impl Into<String>) -> Self {
        self.input_file = Some(input_file.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_raw_response(mut self, raw: impl Into<String>) -> Self {
        self.raw_response = Some(raw.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Output of the three-layer validation pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Overall validation passed.
    pub is_valid: bool,

    /// Layer 1: schema validation.
    pub schema_valid: bool,

    /// Layer 2: business rules.
    pub business_rules_valid: bool,

    /// Layer 3: confidence score (0.0 to 1.0).
    pub confidence_score: f64,

    /// Schema validation errors.
    #[serde(default)]
    pub schema_errors: Vec<String>,

    /// Hard business rule violations.
    #[serde(default)]
    pub business_rule_errors: Vec<String>,

    /// Soft violations; never block success.
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Per-field confidence scores, when available.
    #[serde(default)]
    pub field_confidence: HashMap<String, f64>,
}
