//! Layer 1: schema validation.
//!
//! Parses raw provider text into a typed invoice or collects structured
//! errors. Never panics; always returns either a valid invoice or a
//! non-empty error list.

use crate::types::invoice::{ExtractedInvoice, InvoiceDraft};

/// Detailed schema outcome, distinguishing unparseable text from parseable
/// text that violates the schema.
///
/// The distinction matters to the orchestrator: a parse error is not retried
/// against the same provider, but a fallback re-prompt may still be
/// attempted.
#[derive(Debug, Clone)]
pub enum SchemaOutcome {
    /// Text parsed and every field validated.
    Valid(ExtractedInvoice),

    /// Text parsed but one or more fields violate the schema.
    Invalid(Vec<String>),

    /// Text is not JSON at all.
    ParseError(String),
}

/// Strip a wrapping markdown code fence, if present.
///
/// Providers often wrap JSON in ``` or ```json fences despite instructions.
pub fn strip_code_fences(raw: &str) -> String {
    let cleaned = raw.trim();
    if !cleaned.starts_with("```") {
        return cleaned.to_string();
    }

    let mut lines: Vec<&str> = cleaned.lines().collect();
    lines.remove(0);
    if let Some(last) = lines.last() {
        if last.trim() == "```" {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// Parse raw provider text with full outcome detail.
pub fn parse_invoice(raw_text: &str) -> SchemaOutcome {
    let cleaned = strip_code_fences(raw_text);

    let draft: InvoiceDraft = match serde_json::from_str(&cleaned) {
        Ok(draft) => draft,
        Err(error) => return SchemaOutcome::ParseError(format!("JSON parse error: {error}")),
    };

    match ExtractedInvoice::try_from(draft) {
        Ok(invoice) => SchemaOutcome::Valid(invoice),
        Err(violations) => SchemaOutcome::Invalid(violations.into_errors()),
    }
}

/// Validate raw provider text against the invoice schema.
///
/// Returns `(Some(invoice), [])` on success or `(None, errors)` on failure;
/// the error list is never empty on failure.
pub fn validate_schema(raw_text: &str) -> (Option<ExtractedInvoice>, Vec<String>) {
    match parse_invoice(raw_text) {
        SchemaOutcome::Valid(invoice) => (Some(invoice), Vec::new()),
        SchemaOutcome::Invalid(errors) => (None, errors),
        SchemaOutcome::ParseError(error) => (None, vec![error]),
    }
}
