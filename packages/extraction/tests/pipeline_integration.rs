//! Integration tests for the full extraction pipeline.
//!
//! These tests drive every stage end-to-end against the mock provider and
//! in-memory collaborators:
//! 1. Preprocess page bitmaps
//! 2. Build the vendor prompt
//! 3. Extract through the gateway (retry + fallback)
//! 4. Validate (schema, business rules, confidence)
//! 5. Persist and emit events

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbImage};

use invoice_extraction::testing::{
    fenced, MockProvider, SAMPLE_UBEREATS_JSON, SAMPLE_UNDERPAID_JSON,
};
use invoice_extraction::{
    ExtractionGateway, InvoiceConvertedMessage, MemoryMessageBus, MemoryObjectStore,
    MemoryTabularStore, Pipeline, PipelineConfig, RetryPolicy, VendorType,
};

/// A small single-page PNG, stand-in for a converted invoice scan.
fn page_png() -> Vec<u8> {
    let rgb = RgbImage::from_pixel(64, 96, image::Rgb([255, 255, 255]));
    let mut bytes = Vec::new();
    PngEncoder::new(Cursor::new(&mut bytes))
        .write_image(rgb.as_raw(), 64, 96, image::ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

struct TestHarness {
    pipeline: Pipeline<Arc<MemoryObjectStore>, Arc<MemoryMessageBus>, Arc<MemoryTabularStore>>,
    storage: Arc<MemoryObjectStore>,
    bus: Arc<MemoryMessageBus>,
    tabular: Arc<MemoryTabularStore>,
}

fn harness(gateway: ExtractionGateway) -> TestHarness {
    let storage = Arc::new(MemoryObjectStore::new());
    let bus = Arc::new(MemoryMessageBus::new());
    let tabular = Arc::new(MemoryTabularStore::new());

    let pipeline = Pipeline::new(
        gateway,
        Arc::clone(&storage),
        Arc::clone(&bus),
        Arc::clone(&tabular),
        PipelineConfig::default(),
    );

    TestHarness {
        pipeline,
        storage,
        bus,
        tabular,
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1))
}

#[tokio::test]
async fn successful_run_extracts_persists_and_emits() {
    let provider =
        MockProvider::succeeding("gemini", SAMPLE_UBEREATS_JSON).with_confidence(0.9);
    let gateway = ExtractionGateway::new(Box::new(provider)).with_retry_policy(fast_policy());
    let h = harness(gateway);

    let result = h
        .pipeline
        .run("input/invoice.tiff", VendorType::Ubereats, vec![page_png()])
        .await;

    assert!(result.success, "errors: {:?}", result.errors);
    let invoice = result.invoice.expect("invoice present on success");
    assert_eq!(invoice.invoice_id(), "UE-2026-001234");
    assert_eq!(result.provider, "gemini");
    assert!(result.confidence >= 0.9);
    assert!(result.errors.is_empty());

    // Event published with the stable contract fields
    let events = h.bus.published_on(&h.pipeline.config().extracted_topic);
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event["source_file"], "input/invoice.tiff");
    assert_eq!(event["vendor_type"], "ubereats");
    assert_eq!(event["extraction_model"], "gemini");
    assert!(event["confidence_score"].as_f64().unwrap() >= 0.9);
    assert_eq!(event["extracted_data"]["invoice_id"], "UE-2026-001234");

    // Invoice row plus one row per line item
    let config = h.pipeline.config();
    assert_eq!(h.tabular.rows(&config.dataset, &config.invoices_table).len(), 1);
    assert_eq!(
        h.tabular.rows(&config.dataset, &config.line_items_table).len(),
        3
    );
}

#[tokio::test]
async fn duplicate_invoice_is_not_inserted_twice() {
    let provider = MockProvider::succeeding("gemini", SAMPLE_UBEREATS_JSON);
    let gateway = ExtractionGateway::new(Box::new(provider)).with_retry_policy(fast_policy());
    let h = harness(gateway);

    let first = h
        .pipeline
        .run("input/invoice.tiff", VendorType::Ubereats, vec![page_png()])
        .await;
    let second = h
        .pipeline
        .run("input/invoice.tiff", VendorType::Ubereats, vec![page_png()])
        .await;

    assert!(first.success && second.success);

    // Check-then-insert suppressed the duplicate rows
    let config = h.pipeline.config();
    assert_eq!(h.tabular.rows(&config.dataset, &config.invoices_table).len(), 1);
    assert_eq!(
        h.tabular.rows(&config.dataset, &config.line_items_table).len(),
        3
    );
    // Both runs still emitted their events
    assert_eq!(h.bus.published_on(&config.extracted_topic).len(), 2);
}

#[tokio::test]
async fn underpaid_total_fails_validation_and_emits_error_record() {
    let provider = MockProvider::succeeding("gemini", SAMPLE_UNDERPAID_JSON);
    let gateway = ExtractionGateway::new(Box::new(provider)).with_retry_policy(fast_policy());
    let h = harness(gateway);

    let result = h
        .pipeline
        .run("input/invoice.tiff", VendorType::Ubereats, vec![page_png()])
        .await;

    assert!(!result.success);
    assert!(result.invoice.is_none());
    assert!(result.errors.iter().any(|e| e.starts_with("BR-001")));

    let config = h.pipeline.config();
    assert!(h.bus.published_on(&config.extracted_topic).is_empty());
    let records = h.bus.published_on(&config.failed_topic);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["source_file"], "input/invoice.tiff");

    // Nothing persisted on failure
    assert!(h.tabular.rows(&config.dataset, &config.invoices_table).is_empty());
}

#[tokio::test]
async fn fallback_provider_carries_the_run_when_primary_is_down() {
    let primary = MockProvider::failing("gemini", "503 service unavailable");
    let fallback =
        MockProvider::succeeding("openrouter", SAMPLE_UBEREATS_JSON).with_confidence(0.85);

    let gateway = ExtractionGateway::new(Box::new(primary))
        .with_fallback(Box::new(fallback))
        .with_retry_policy(fast_policy());
    let h = harness(gateway);

    let result = h
        .pipeline
        .run("input/invoice.tiff", VendorType::Ubereats, vec![page_png()])
        .await;

    assert!(result.success);
    assert_eq!(result.provider, "openrouter");

    let events = h.bus.published_on(&h.pipeline.config().extracted_topic);
    assert_eq!(events[0]["extraction_model"], "openrouter");
}

#[tokio::test]
async fn total_provider_outage_reports_both_providers() {
    let primary = MockProvider::failing("gemini", "503 service unavailable");
    let fallback = MockProvider::failing("openrouter", "401 unauthorized");

    let gateway = ExtractionGateway::new(Box::new(primary))
        .with_fallback(Box::new(fallback))
        .with_retry_policy(fast_policy());
    let h = harness(gateway);

    let result = h
        .pipeline
        .run("input/invoice.tiff", VendorType::Ubereats, vec![page_png()])
        .await;

    assert!(!result.success);
    let combined = result.errors.join(" ");
    assert!(combined.contains("gemini"));
    assert!(combined.contains("openrouter"));
}

#[tokio::test]
async fn fenced_provider_output_is_accepted() {
    let provider = MockProvider::succeeding("gemini", fenced(SAMPLE_UBEREATS_JSON));
    let gateway = ExtractionGateway::new(Box::new(provider)).with_retry_policy(fast_policy());
    let h = harness(gateway);

    let result = h
        .pipeline
        .run("input/invoice.tiff", VendorType::Ubereats, vec![page_png()])
        .await;

    assert!(result.success, "errors: {:?}", result.errors);
}

#[tokio::test]
async fn unparseable_primary_output_triggers_one_fallback_reprompt() {
    let primary = MockProvider::succeeding("gemini", "Sorry, I cannot read this invoice.");
    let fallback = MockProvider::succeeding("openrouter", SAMPLE_UBEREATS_JSON);
    let fallback_calls = fallback.call_counter();

    let gateway = ExtractionGateway::new(Box::new(primary))
        .with_fallback(Box::new(fallback))
        .with_retry_policy(fast_policy());
    let h = harness(gateway);

    let result = h
        .pipeline
        .run("input/invoice.tiff", VendorType::Ubereats, vec![page_png()])
        .await;

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.provider, "openrouter");
    assert_eq!(fallback_calls.get(), 1);
}

#[tokio::test]
async fn message_entry_point_resolves_pages_from_storage() {
    use invoice_extraction::ObjectStore as _;

    let provider = MockProvider::succeeding("gemini", SAMPLE_UBEREATS_JSON);
    let gateway = ExtractionGateway::new(Box::new(provider)).with_retry_policy(fast_policy());
    let h = harness(gateway);

    h.storage
        .write("processed", "invoice_p1.png", &page_png(), "image/png")
        .await
        .unwrap();

    let message = InvoiceConvertedMessage {
        source_file: "mem://input/invoice.tiff".to_string(),
        vendor_type: VendorType::Ubereats,
        converted_files: vec!["mem://processed/invoice_p1.png".to_string()],
        page_count: 1,
        event_time: chrono::Utc::now(),
    };

    let result = h.pipeline.handle_message(&message).await;
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.input_file.as_deref(), Some("mem://input/invoice.tiff"));
}

#[tokio::test]
async fn missing_page_reference_fails_before_any_provider_call() {
    let provider = MockProvider::succeeding("gemini", SAMPLE_UBEREATS_JSON);
    let calls = provider.call_counter();
    let gateway = ExtractionGateway::new(Box::new(provider)).with_retry_policy(fast_policy());
    let h = harness(gateway);

    let message = InvoiceConvertedMessage {
        source_file: "mem://input/invoice.tiff".to_string(),
        vendor_type: VendorType::Ubereats,
        converted_files: vec!["mem://processed/missing.png".to_string()],
        page_count: 1,
        event_time: chrono::Utc::now(),
    };

    let result = h.pipeline.handle_message(&message).await;
    assert!(!result.success);
    assert_eq!(calls.get(), 0);
}

#[tokio::test]
async fn corrupt_input_bytes_fail_in_preprocessing() {
    let provider = MockProvider::succeeding("gemini", SAMPLE_UBEREATS_JSON);
    let calls = provider.call_counter();
    let gateway = ExtractionGateway::new(Box::new(provider)).with_retry_policy(fast_policy());
    let h = harness(gateway);

    let result = h
        .pipeline
        .run(
            "input/invoice.tiff",
            VendorType::Ubereats,
            vec![b"definitely not an image".to_vec()],
        )
        .await;

    assert!(!result.success);
    assert!(result.errors[0].contains("image processing failed"));
    assert_eq!(calls.get(), 0);
}
