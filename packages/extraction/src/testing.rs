//! Testing utilities including mock implementations.
//!
//! Useful for exercising the gateway and pipeline without real provider or
//! network calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::traits::provider::{LlmProvider, ProviderResponse};
use crate::types::invoice::ExtractedInvoice;
use crate::types::page::PageImage;

/// Shared call counter handle for assertions.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

enum MockBehavior {
    Succeed,
    Fail(String),
    FailTimes(usize, String),
}

/// A scripted LLM provider for tests.
///
/// Returns deterministic outcomes and records every call.
pub struct MockProvider {
    name: String,
    content: String,
    confidence: Option<f64>,
    tokens_used: Option<u32>,
    delay: Option<Duration>,
    behavior: MockBehavior,
    calls: CallCounter,
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockProvider {
    /// A provider that always succeeds with the given content.
    pub fn succeeding(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            confidence: None,
            tokens_used: None,
            delay: None,
            behavior: MockBehavior::Succeed,
            calls: CallCounter::default(),
            prompts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A provider that always fails with the given API error message.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut provider = Self::succeeding(name, "");
        provider.behavior = MockBehavior::Fail(message.into());
        provider
    }

    /// Fail the first `n` calls, then succeed with the configured content.
    pub fn fail_times(mut self, n: usize) -> Self {
        self.behavior = MockBehavior::FailTimes(n, "transient failure".to_string());
        self
    }

    /// Report a self-assessed confidence on successful calls.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Report a token count on successful calls.
    pub fn with_tokens_used(mut self, tokens: u32) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle to the call counter (usable after the provider is boxed).
    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.read().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(
        &self,
        prompt: &str,
        _pages: &[PageImage],
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let call_index = self.calls.increment();
        self.prompts.write().unwrap().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let succeed = match &self.behavior {
            MockBehavior::Succeed => Ok(()),
            MockBehavior::Fail(message) => Err(message.clone()),
            MockBehavior::FailTimes(n, message) => {
                if call_index < *n {
                    Err(message.clone())
                } else {
                    Ok(())
                }
            }
        };

        match succeed {
            Ok(()) => {
                let mut response = ProviderResponse::new(self.content.clone());
                response.tokens_used = self.tokens_used;
                response.confidence = self.confidence;
                Ok(response)
            }
            Err(message) => Err(ProviderError::Api {
                provider: self.name.clone(),
                message,
            }),
        }
    }
}

/// Canonical UberEats payout invoice, as a provider would emit it.
///
/// Payout-style: `total = subtotal + tax - commission`.
pub const SAMPLE_UBEREATS_JSON: &str = r#"{
    "invoice_id": "UE-2026-001234",
    "vendor_name": "Test Restaurant ABC",
    "vendor_type": "ubereats",
    "invoice_date": "2026-01-15",
    "due_date": "2026-01-29",
    "currency": "USD",
    "line_items": [
        {"description": "Order Sales", "quantity": 1, "unit_price": "1250.00"},
        {"description": "Delivery Fees Collected", "quantity": 1, "unit_price": "185.00"},
        {"description": "Promotions Adjustment", "quantity": 1, "unit_price": "45.00"}
    ],
    "subtotal": "1480.00",
    "tax_amount": "0.00",
    "commission_rate": "0.25",
    "commission_amount": "370.00",
    "total_amount": "1110.00"
}"#;

/// Same invoice with a total low enough to trip the BR-001 floor.
pub const SAMPLE_UNDERPAID_JSON: &str = r#"{
    "invoice_id": "UE-2026-001235",
    "vendor_name": "Test Restaurant ABC",
    "vendor_type": "ubereats",
    "invoice_date": "2026-01-15",
    "due_date": "2026-01-29",
    "currency": "USD",
    "line_items": [],
    "subtotal": "1480.00",
    "tax_amount": "0.00",
    "commission_rate": "0.25",
    "commission_amount": "370.00",
    "total_amount": "900.00"
}"#;

/// Parse the canonical sample invoice.
pub fn sample_invoice() -> ExtractedInvoice {
    serde_json::from_str(SAMPLE_UBEREATS_JSON).unwrap()
}

/// Wrap provider output in a markdown code fence, the way models often do.
pub fn fenced(content: &str) -> String {
    format!("```json\n{content}\n```")
}
