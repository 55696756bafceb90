//! Invoice Extraction & Validation Pipeline
//!
//! Extracts structured financial data from scanned invoice images using a
//! language-model provider, then validates the result before it is trusted
//! downstream.
//!
//! # Design
//!
//! - Provider-fallback gateway with bounded retries and exponential backoff
//! - Three-layer validator: schema, cross-field business rules, confidence
//! - Strictly sequential orchestrator; one typed outcome per run
//! - Collaborators (object storage, message bus, tabular store) behind
//!   traits; nothing is shared between runs
//!
//! # Usage
//!
//! ```rust,ignore
//! use invoice_extraction::{
//!     ExtractionGateway, GeminiProvider, MemoryMessageBus, MemoryObjectStore,
//!     MemoryTabularStore, OpenRouterProvider, Pipeline, PipelineConfig, VendorType,
//! };
//!
//! let gateway = ExtractionGateway::new(Box::new(GeminiProvider::from_env()?))
//!     .with_fallback(Box::new(OpenRouterProvider::from_env()?));
//!
//! let pipeline = Pipeline::new(
//!     gateway,
//!     MemoryObjectStore::new(),
//!     MemoryMessageBus::new(),
//!     MemoryTabularStore::new(),
//!     PipelineConfig::from_env()?,
//! );
//!
//! let result = pipeline.run("invoice.tiff", VendorType::Ubereats, vec![bytes]).await;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (provider, storage, bus, tabular)
//! - [`types`] - Invoice data model, results, messages, configuration
//! - [`gateway`] - Provider-fallback extraction gateway
//! - [`validate`] - Three-layer validation
//! - [`preprocess`] - Page bitmap normalization
//! - [`prompts`] - Vendor prompt templates and schema injection
//! - [`pipeline`] - The orchestrator state machine
//! - [`providers`] - Gemini and OpenRouter implementations
//! - [`security`] - Credential handling
//! - [`stores`] - In-memory collaborator implementations
//! - [`testing`] - Mock provider and fixtures

pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod preprocess;
pub mod prompts;
pub mod providers;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod validate;

// Re-export core types at crate root
pub use error::{ExtractionError, ProviderError, Result};
pub use gateway::{ExtractionGateway, GatewayResponse};
pub use pipeline::{Pipeline, PipelineStage};
pub use preprocess::{ImagePreprocessor, SUPPORTED_EXTENSIONS};
pub use prompts::{build_extraction_prompt, extraction_prompt_hash, invoice_schema_json};
pub use providers::{GeminiProvider, OpenRouterProvider};
pub use security::SecretString;
pub use stores::{MemoryMessageBus, MemoryObjectStore, MemoryTabularStore};
pub use traits::{
    bus::MessageBus,
    provider::{LlmProvider, ProviderResponse},
    store::{split_object_uri, ObjectStore},
    tabular::TabularStore,
};
pub use types::{
    config::{PipelineConfig, RetryPolicy},
    invoice::{
        Currency, ExtractedInvoice, InvoiceDraft, LineItem, LineItemDraft, SchemaViolations,
        VendorType,
    },
    messages::{InvoiceConvertedMessage, InvoiceExtractedMessage, InvoiceFailedMessage},
    page::{PageImage, ProcessedPages},
    result::{ExtractionResult, ValidationResult},
};
pub use validate::{
    check_business_rules, rule_warnings, score, strip_code_fences, validate_extraction,
    validate_schema, SchemaOutcome,
};
