//! Provider trait for LLM extraction calls.
//!
//! Implementations wrap specific model services (Gemini, OpenRouter, ...)
//! and handle the specifics of request encoding and response parsing. The
//! gateway owns retries, timeouts, and fallback; providers make exactly one
//! attempt per call.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::page::PageImage;

/// A single successful provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    /// Raw response text (expected to be JSON, possibly fenced).
    pub content: String,

    /// Total tokens consumed, when reported.
    pub tokens_used: Option<u32>,

    /// Provider self-reported confidence (0.0 to 1.0), when reported.
    pub confidence: Option<f64>,
}

impl ProviderResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tokens_used: None,
            confidence: None,
        }
    }

    pub fn with_tokens_used(mut self, tokens: u32) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// An external model service that extracts structured fields from images.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider identifier (e.g. "gemini", "openrouter").
    fn name(&self) -> &str;

    /// Run one extraction call with the prompt and page bitmaps.
    ///
    /// Makes a single attempt; the gateway layers retry and fallback on top.
    async fn extract(
        &self,
        prompt: &str,
        pages: &[PageImage],
    ) -> std::result::Result<ProviderResponse, ProviderError>;
}
