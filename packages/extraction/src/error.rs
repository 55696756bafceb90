//! Typed errors for the extraction pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Error taxonomy:
//! - Provider errors are retried per the gateway policy, then become terminal.
//! - Parse and schema errors are collected by the validator, never raised.
//! - Persistence errors are caught at the orchestrator boundary and converted
//!   into a failure result so the invocation layer can retry the whole run.

use thiserror::Error;

/// Errors that can occur during pipeline operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// LLM provider call failed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Page bitmap could not be decoded
    #[error("image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Multi-page TIFF could not be decoded
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Input is not a supported bitmap format
    #[error("unsupported image format: {format}")]
    UnsupportedFormat { format: String },

    /// JSON serialization or parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Object storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Object not found in storage
    #[error("object not found: {bucket}/{path}")]
    ObjectNotFound { bucket: String, path: String },

    /// Message bus publish failed
    #[error("message bus error: {0}")]
    Messaging(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Tabular store operation failed
    #[error("tabular store error: {0}")]
    Tabular(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors from a single LLM provider call.
///
/// Transport failures, timeouts, and empty bodies are all treated identically
/// by the gateway's retry/fallback policy.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP transport failed
    #[error("HTTP error from {provider}: {source}")]
    Http {
        provider: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Request exceeded the configured timeout
    #[error("{provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    /// Provider returned an empty or contentless body
    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    /// Provider returned a non-success status or API-level error
    #[error("{provider} API error: {message}")]
    Api { provider: String, message: String },

    /// Call was cancelled while waiting to retry
    #[error("{provider} call cancelled")]
    Cancelled { provider: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;
