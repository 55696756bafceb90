//! Provider-fallback extraction gateway.
//!
//! Policy: attempt the primary provider; on any failure (transport error,
//! timeout, empty body) retry the same provider with exponential backoff
//! until the policy is exhausted, then run the identical policy against the
//! fallback. The first success wins; the fallback is never attempted once
//! the primary has succeeded. The gateway never returns an error: every
//! call produces a typed [`GatewayResponse`], even under total failure.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::traits::provider::{LlmProvider, ProviderResponse};
use crate::types::config::RetryPolicy;
use crate::types::page::PageImage;

/// Typed outcome of one gateway call.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// Whether any provider in the chain succeeded.
    pub success: bool,

    /// Response text from the successful provider.
    pub content: Option<String>,

    /// Identifier of the provider that produced the outcome (on total
    /// failure, the last provider attempted).
    pub provider: String,

    /// Wall-clock latency across the whole chain, in milliseconds.
    pub latency_ms: u64,

    /// Tokens consumed, when the successful provider reports them.
    pub tokens_used: Option<u32>,

    /// Provider self-reported confidence, when available.
    pub provider_confidence: Option<f64>,

    /// Terminal error text; on both-chains-exhausted it concatenates both
    /// providers' final errors.
    pub error: Option<String>,
}

impl GatewayResponse {
    fn success(provider: &str, response: ProviderResponse, latency_ms: u64) -> Self {
        Self {
            success: true,
            content: Some(response.content),
            provider: provider.to_string(),
            latency_ms,
            tokens_used: response.tokens_used,
            provider_confidence: response.confidence,
            error: None,
        }
    }

    fn failure(provider: &str, error: String, latency_ms: u64) -> Self {
        Self {
            success: false,
            content: None,
            provider: provider.to_string(),
            latency_ms,
            tokens_used: None,
            provider_confidence: None,
            error: Some(error),
        }
    }
}

/// Calls a primary provider with bounded retries, then a fallback.
pub struct ExtractionGateway {
    primary: Box<dyn LlmProvider>,
    fallback: Option<Box<dyn LlmProvider>>,
    policy: RetryPolicy,
    timeout: Duration,
    cancel: CancellationToken,
}

impl ExtractionGateway {
    /// Create a gateway with a primary provider and default policy.
    pub fn new(primary: Box<dyn LlmProvider>) -> Self {
        Self {
            primary,
            fallback: None,
            policy: RetryPolicy::default(),
            timeout: Duration::from_secs(60),
            cancel: CancellationToken::new(),
        }
    }

    /// Configure a fallback provider.
    pub fn with_fallback(mut self, fallback: Box<dyn LlmProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Override the retry policy (applies to each provider chain).
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the per-call timeout (treated like any other failure).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Honor an external cancellation token during backoff waits.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    pub fn fallback_name(&self) -> Option<&str> {
        self.fallback.as_deref().map(|p| p.name())
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Run the full primary-then-fallback chain.
    pub async fn extract(&self, prompt: &str, pages: &[PageImage]) -> GatewayResponse {
        let started = Instant::now();

        let primary_error = match self.try_provider(self.primary.as_ref(), prompt, pages).await {
            Ok(response) => {
                return GatewayResponse::success(
                    self.primary.name(),
                    response,
                    elapsed_ms(started),
                )
            }
            Err(error) => error,
        };

        if matches!(primary_error, ProviderError::Cancelled { .. }) {
            return GatewayResponse::failure(
                self.primary.name(),
                primary_error.to_string(),
                elapsed_ms(started),
            );
        }

        let Some(fallback) = self.fallback.as_deref() else {
            return GatewayResponse::failure(
                self.primary.name(),
                format!("{} failed: {}", self.primary.name(), primary_error),
                elapsed_ms(started),
            );
        };

        info!(
            primary = self.primary.name(),
            fallback = fallback.name(),
            error = %primary_error,
            "primary provider exhausted, falling back"
        );

        match self.try_provider(fallback, prompt, pages).await {
            Ok(response) => {
                GatewayResponse::success(fallback.name(), response, elapsed_ms(started))
            }
            Err(fallback_error) => GatewayResponse::failure(
                fallback.name(),
                format!(
                    "{} failed: {}. {} failed: {}",
                    self.primary.name(),
                    primary_error,
                    fallback.name(),
                    fallback_error
                ),
                elapsed_ms(started),
            ),
        }
    }

    /// Run the retry chain against the fallback provider only.
    ///
    /// Used when the primary answered but its output could not be parsed; a
    /// fallback re-prompt may still salvage the run.
    pub async fn extract_via_fallback(
        &self,
        prompt: &str,
        pages: &[PageImage],
    ) -> Option<GatewayResponse> {
        let fallback = self.fallback.as_deref()?;
        let started = Instant::now();

        Some(match self.try_provider(fallback, prompt, pages).await {
            Ok(response) => {
                GatewayResponse::success(fallback.name(), response, elapsed_ms(started))
            }
            Err(error) => GatewayResponse::failure(
                fallback.name(),
                format!("{} failed: {}", fallback.name(), error),
                elapsed_ms(started),
            ),
        })
    }

    /// One provider's retry chain: call, and on failure back off and retry
    /// until the policy is exhausted. Timeouts and empty bodies count as
    /// failures like any transport error.
    async fn try_provider(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
        pages: &[PageImage],
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let name = provider.name().to_string();
        let mut last_error = ProviderError::EmptyResponse {
            provider: name.clone(),
        };

        for attempt in 1..=self.policy.max_attempts() {
            if attempt > 1 {
                let delay = self.policy.delay_before_retry(attempt - 1);
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        return Err(ProviderError::Cancelled { provider: name });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let outcome = tokio::time::timeout(self.timeout, provider.extract(prompt, pages)).await;

            let error = match outcome {
                Err(_) => ProviderError::Timeout {
                    provider: name.clone(),
                    seconds: self.timeout.as_secs(),
                },
                Ok(Err(error)) => error,
                Ok(Ok(response)) if response.content.trim().is_empty() => {
                    ProviderError::EmptyResponse {
                        provider: name.clone(),
                    }
                }
                Ok(Ok(response)) => {
                    if attempt > 1 {
                        info!(provider = %name, attempt, "provider recovered after retry");
                    }
                    return Ok(response);
                }
            };

            warn!(
                provider = %name,
                attempt,
                max_attempts = self.policy.max_attempts(),
                error = %error,
                "provider attempt failed"
            );
            last_error = error;
        }

        Err(last_error)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let primary = MockProvider::succeeding("gemini", "{}");
        let fallback = MockProvider::failing("openrouter", "should not be called");
        let fallback_calls = fallback.call_counter();

        let gateway = ExtractionGateway::new(Box::new(primary))
            .with_fallback(Box::new(fallback))
            .with_retry_policy(fast_policy());

        let response = gateway.extract("prompt", &[]).await;
        assert!(response.success);
        assert_eq!(response.provider, "gemini");
        assert_eq!(fallback_calls.get(), 0);
    }

    #[tokio::test]
    async fn primary_retries_then_recovers() {
        let primary = MockProvider::succeeding("gemini", "{}").fail_times(2);
        let calls = primary.call_counter();

        let gateway =
            ExtractionGateway::new(Box::new(primary)).with_retry_policy(fast_policy());

        let response = gateway.extract("prompt", &[]).await;
        assert!(response.success);
        assert_eq!(calls.get(), 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn fallback_wins_when_primary_always_fails() {
        let primary = MockProvider::failing("gemini", "503 unavailable");
        let primary_calls = primary.call_counter();
        let fallback = MockProvider::succeeding("openrouter", r#"{"ok":true}"#);

        let gateway = ExtractionGateway::new(Box::new(primary))
            .with_fallback(Box::new(fallback))
            .with_retry_policy(fast_policy());

        let response = gateway.extract("prompt", &[]).await;
        assert!(response.success);
        assert_eq!(response.provider, "openrouter");
        assert_eq!(primary_calls.get(), 3); // full retry chain before fallback
    }

    #[tokio::test]
    async fn both_exhausted_reports_both_providers() {
        let primary = MockProvider::failing("gemini", "503 unavailable");
        let fallback = MockProvider::failing("openrouter", "401 bad key");

        let gateway = ExtractionGateway::new(Box::new(primary))
            .with_fallback(Box::new(fallback))
            .with_retry_policy(fast_policy());

        let response = gateway.extract("prompt", &[]).await;
        assert!(!response.success);
        let error = response.error.unwrap();
        assert!(error.contains("gemini"), "missing primary in: {error}");
        assert!(error.contains("openrouter"), "missing fallback in: {error}");
        assert!(error.contains("503 unavailable"));
        assert!(error.contains("401 bad key"));
    }

    #[tokio::test]
    async fn empty_content_is_retried_like_a_failure() {
        let primary = MockProvider::succeeding("gemini", "   ");
        let calls = primary.call_counter();

        let gateway =
            ExtractionGateway::new(Box::new(primary)).with_retry_policy(fast_policy());

        let response = gateway.extract("prompt", &[]).await;
        assert!(!response.success);
        assert_eq!(calls.get(), 3);
        assert!(response.error.unwrap().contains("empty response"));
    }

    #[tokio::test]
    async fn no_fallback_failure_names_the_primary() {
        let primary = MockProvider::failing("gemini", "boom");

        let gateway =
            ExtractionGateway::new(Box::new(primary)).with_retry_policy(fast_policy());

        let response = gateway.extract("prompt", &[]).await;
        assert!(!response.success);
        assert_eq!(response.provider, "gemini");
        assert!(response.error.unwrap().contains("gemini failed"));
    }

    #[tokio::test]
    async fn cancellation_stops_the_chain_before_fallback() {
        let primary = MockProvider::failing("gemini", "boom");
        let fallback = MockProvider::succeeding("openrouter", "{}");
        let fallback_calls = fallback.call_counter();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let gateway = ExtractionGateway::new(Box::new(primary))
            .with_fallback(Box::new(fallback))
            .with_retry_policy(RetryPolicy::new(2, Duration::from_secs(30)))
            .with_cancellation(cancel);

        // The first attempt fails, the backoff wait observes cancellation.
        let response = gateway.extract("prompt", &[]).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("cancelled"));
        assert_eq!(fallback_calls.get(), 0);
    }

    #[tokio::test]
    async fn fallback_only_path_skips_primary() {
        let primary = MockProvider::failing("gemini", "should not be called");
        let primary_calls = primary.call_counter();
        let fallback = MockProvider::succeeding("openrouter", "{}");

        let gateway = ExtractionGateway::new(Box::new(primary))
            .with_fallback(Box::new(fallback))
            .with_retry_policy(fast_policy());

        let response = gateway.extract_via_fallback("prompt", &[]).await.unwrap();
        assert!(response.success);
        assert_eq!(response.provider, "openrouter");
        assert_eq!(primary_calls.get(), 0);
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_exhausts() {
        let primary = MockProvider::succeeding("gemini", "{}").with_delay(Duration::from_secs(5));

        let gateway = ExtractionGateway::new(Box::new(primary))
            .with_retry_policy(RetryPolicy::new(0, Duration::from_millis(1)))
            .with_timeout(Duration::from_millis(20));

        let response = gateway.extract("prompt", &[]).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("timed out"));
    }
}
