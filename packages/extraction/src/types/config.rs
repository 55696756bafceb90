//! Pipeline configuration.
//!
//! Configuration is an explicit struct handed to the pipeline constructor.
//! `from_env` reads the deployment environment once; there is no process-wide
//! memoized loader.

use std::time::Duration;

use crate::error::{ExtractionError, Result};
use crate::security::SecretString;

/// Retry policy for a single provider chain.
///
/// `max_retries` counts attempts after the first, so the provider is called
/// at most `max_retries + 1` times. Backoff doubles per retry starting at
/// `backoff_base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Delay before the given retry (1-based): base, 2*base, 4*base, ...
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }

    /// Total number of calls a provider may receive.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Primary provider model name.
    pub gemini_model: String,

    /// API key for the primary provider.
    pub google_api_key: Option<SecretString>,

    /// Fallback provider model name.
    pub openrouter_model: String,

    /// API key for the fallback provider; no key means no fallback.
    pub openrouter_api_key: Option<SecretString>,

    /// Per-call provider timeout.
    pub request_timeout: Duration,

    /// Retry policy applied identically to each provider chain.
    pub retry: RetryPolicy,

    /// Maximum page bitmap dimension in pixels.
    pub max_image_dimension: u32,

    /// Bucket holding converted page bitmaps.
    pub processed_bucket: String,

    /// Bucket failed inputs are copied to.
    pub failed_bucket: String,

    /// Topic for successful extraction events.
    pub extracted_topic: String,

    /// Topic for failure records.
    pub failed_topic: String,

    /// Tabular store dataset.
    pub dataset: String,

    /// Invoice rows table.
    pub invoices_table: String,

    /// Line item rows table.
    pub line_items_table: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gemini_model: "gemini-2.5-flash".to_string(),
            google_api_key: None,
            openrouter_model: "anthropic/claude-3.5-sonnet".to_string(),
            openrouter_api_key: None,
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            max_image_dimension: 4096,
            processed_bucket: "invoices-processed".to_string(),
            failed_bucket: "invoices-failed".to_string(),
            extracted_topic: "invoice-extracted".to_string(),
            failed_topic: "invoice-failed".to_string(),
            dataset: "invoices".to_string(),
            invoices_table: "extracted_invoices".to_string(),
            line_items_table: "line_items".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables, with defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let request_timeout = match std::env::var("LLM_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                ExtractionError::Config(format!("LLM_TIMEOUT_SECS is not a number: {raw}"))
            })?),
            Err(_) => defaults.request_timeout,
        };

        Ok(Self {
            gemini_model: env_or("GEMINI_MODEL", &defaults.gemini_model),
            google_api_key: std::env::var("GOOGLE_API_KEY").ok().map(SecretString::from),
            openrouter_model: env_or("OPENROUTER_MODEL", &defaults.openrouter_model),
            openrouter_api_key: std::env::var("OPENROUTER_API_KEY")
                .ok()
                .map(SecretString::from),
            request_timeout,
            retry: RetryPolicy::default(),
            max_image_dimension: defaults.max_image_dimension,
            processed_bucket: env_or("PROCESSED_BUCKET", &defaults.processed_bucket),
            failed_bucket: env_or("FAILED_BUCKET", &defaults.failed_bucket),
            extracted_topic: env_or("EXTRACTED_TOPIC", &defaults.extracted_topic),
            failed_topic: env_or("FAILED_TOPIC", &defaults.failed_topic),
            dataset: env_or("BQ_DATASET", &defaults.dataset),
            invoices_table: env_or("BQ_INVOICES_TABLE", &defaults.invoices_table),
            line_items_table: env_or("BQ_LINE_ITEMS_TABLE", &defaults.line_items_table),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_image_dimension(mut self, dimension: u32) -> Self {
        self.max_image_dimension = dimension;
        self
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
