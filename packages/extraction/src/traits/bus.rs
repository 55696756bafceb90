//! Message bus trait.

use async_trait::async_trait;

use crate::error::Result;

/// Topic-based message publishing.
///
/// Delivery guarantees are the bus's responsibility, not this crate's.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a JSON payload to a topic; returns the message id.
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<String>;
}

#[async_trait]
impl<T> MessageBus for std::sync::Arc<T>
where
    T: MessageBus + ?Sized,
{
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<String> {
        (**self).publish(topic, payload).await
    }
}
