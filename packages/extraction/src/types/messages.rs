//! Message contracts between pipeline stages.
//!
//! Field names are stable: downstream consumers depend on them. Delivery
//! guarantees belong to the bus, not to these payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::invoice::VendorType;

/// Input message: pages have been converted and are ready for extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceConvertedMessage {
    /// URI of the original scanned document.
    pub source_file: String,

    /// Vendor hint for prompt selection.
    pub vendor_type: VendorType,

    /// Object references of the converted page bitmaps, in page order.
    pub converted_files: Vec<String>,

    /// Number of pages converted.
    pub page_count: usize,

    #[serde(default = "Utc::now")]
    pub event_time: DateTime<Utc>,
}

/// Output message published after a successful extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceExtractedMessage {
    /// URI of the original scanned document.
    pub source_file: String,

    /// Vendor type the extraction ran with.
    pub vendor_type: VendorType,

    /// Provider identifier that produced the extraction.
    pub extraction_model: String,

    /// Extraction latency in milliseconds.
    pub extraction_latency_ms: u64,

    /// Overall confidence score (0.0 to 1.0).
    pub confidence_score: f64,

    /// Serialized [`ExtractedInvoice`](crate::types::invoice::ExtractedInvoice).
    pub extracted_data: serde_json::Value,

    #[serde(default = "Utc::now")]
    pub event_time: DateTime<Utc>,
}

/// Error record published when a run short-circuits to failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceFailedMessage {
    /// URI of the original scanned document.
    pub source_file: String,

    /// Vendor hint the run started with.
    pub vendor_type: VendorType,

    /// Last provider attempted, if any provider was reached.
    pub provider: Option<String>,

    /// Accumulated error messages.
    pub errors: Vec<String>,

    #[serde(default = "Utc::now")]
    pub event_time: DateTime<Utc>,
}
