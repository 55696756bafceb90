//! In-memory collaborator implementations for testing and development.
//!
//! Data is lost on restart; not suitable for production.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ExtractionError, Result};
use crate::traits::bus::MessageBus;
use crate::traits::store::ObjectStore;
use crate::traits::tabular::TabularStore;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// In-memory bucket-addressed object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(bucket: &str, path: &str) -> String {
        format!("{bucket}/{path}")
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    /// Content type recorded for an object, if present.
    pub fn content_type(&self, bucket: &str, path: &str) -> Option<String> {
        self.objects
            .read()
            .unwrap()
            .get(&Self::key(bucket, path))
            .map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .unwrap()
            .get(&Self::key(bucket, path))
            .map(|o| o.data.clone())
            .ok_or_else(|| ExtractionError::ObjectNotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }

    async fn write(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String> {
        self.objects.write().unwrap().insert(
            Self::key(bucket, path),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("mem://{bucket}/{path}"))
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_path: &str,
        dest_bucket: &str,
        dest_path: &str,
    ) -> Result<String> {
        let object = self
            .objects
            .read()
            .unwrap()
            .get(&Self::key(source_bucket, source_path))
            .cloned()
            .ok_or_else(|| ExtractionError::ObjectNotFound {
                bucket: source_bucket.to_string(),
                path: source_path.to_string(),
            })?;

        self.objects
            .write()
            .unwrap()
            .insert(Self::key(dest_bucket, dest_path), object);
        Ok(format!("mem://{dest_bucket}/{dest_path}"))
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        Ok(self
            .objects
            .read()
            .unwrap()
            .contains_key(&Self::key(bucket, path)))
    }
}

/// A message captured by the in-memory bus.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: serde_json::Value,
    pub message_id: String,
}

/// In-memory message bus that records every publish.
#[derive(Default)]
pub struct MemoryMessageBus {
    messages: RwLock<Vec<PublishedMessage>>,
}

impl MemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages published so far.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.messages.read().unwrap().clone()
    }

    /// Payloads published to one topic.
    pub fn published_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.messages
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }
}

#[async_trait]
impl MessageBus for MemoryMessageBus {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<String> {
        let message_id = Uuid::new_v4().to_string();
        self.messages.write().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            message_id: message_id.clone(),
        });
        Ok(message_id)
    }
}

/// In-memory tabular store keyed by `dataset.table`.
///
/// `row_exists` probes the `invoice_id` column, matching the production
/// deduplication query.
#[derive(Default)]
pub struct MemoryTabularStore {
    tables: RwLock<HashMap<String, Vec<serde_json::Value>>>,
}

impl MemoryTabularStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(dataset: &str, table: &str) -> String {
        format!("{dataset}.{table}")
    }

    /// Rows inserted into one table.
    pub fn rows(&self, dataset: &str, table: &str) -> Vec<serde_json::Value> {
        self.tables
            .read()
            .unwrap()
            .get(&Self::key(dataset, table))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TabularStore for MemoryTabularStore {
    async fn insert_row(&self, dataset: &str, table: &str, row: serde_json::Value) -> Result<()> {
        self.tables
            .write()
            .unwrap()
            .entry(Self::key(dataset, table))
            .or_default()
            .push(row);
        Ok(())
    }

    async fn row_exists(&self, dataset: &str, table: &str, key: &str) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .get(&Self::key(dataset, table))
            .map(|rows| {
                rows.iter()
                    .any(|row| row.get("invoice_id").and_then(|v| v.as_str()) == Some(key))
            })
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn object_store_round_trips_and_copies() {
        let store = MemoryObjectStore::new();

        let uri = store
            .write("input", "a/invoice.tiff", b"bytes", "image/tiff")
            .await
            .unwrap();
        assert_eq!(uri, "mem://input/a/invoice.tiff");
        assert!(store.exists("input", "a/invoice.tiff").await.unwrap());

        store
            .copy("input", "a/invoice.tiff", "archive", "a/invoice.tiff")
            .await
            .unwrap();
        assert_eq!(
            store.read("archive", "a/invoice.tiff").await.unwrap(),
            b"bytes"
        );

        let missing = store.read("input", "nope").await;
        assert!(matches!(
            missing,
            Err(ExtractionError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn bus_records_publishes_per_topic() {
        let bus = MemoryMessageBus::new();
        bus.publish("invoice-extracted", json!({"a": 1})).await.unwrap();
        bus.publish("invoice-failed", json!({"b": 2})).await.unwrap();

        assert_eq!(bus.published().len(), 2);
        assert_eq!(bus.published_on("invoice-extracted").len(), 1);
        assert_eq!(bus.published_on("unused").len(), 0);
    }

    #[tokio::test]
    async fn tabular_store_checks_invoice_id_key() {
        let store = MemoryTabularStore::new();
        store
            .insert_row(
                "invoices",
                "extracted_invoices",
                json!({"invoice_id": "UE-2026-000001", "total_amount": 10.0}),
            )
            .await
            .unwrap();

        assert!(store
            .row_exists("invoices", "extracted_invoices", "UE-2026-000001")
            .await
            .unwrap());
        assert!(!store
            .row_exists("invoices", "extracted_invoices", "UE-2026-999999")
            .await
            .unwrap());
    }
}
