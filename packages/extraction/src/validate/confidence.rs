//! Layer 3: confidence scoring.
//!
//! `confidence = 0.40*completeness + 0.30*consistency + 0.30*provider`,
//! clamped to [0, 1]. Completeness is the present-fraction of the six
//! required fields; consistency is the fraction of business rules passed;
//! the provider score defaults to 0.80 when the provider did not report one.

use crate::types::invoice::ExtractedInvoice;
use crate::validate::rules::check_business_rules;

const COMPLETENESS_WEIGHT: f64 = 0.40;
const CONSISTENCY_WEIGHT: f64 = 0.30;
const PROVIDER_WEIGHT: f64 = 0.30;

/// Assumed provider confidence when none is reported.
pub const DEFAULT_PROVIDER_CONFIDENCE: f64 = 0.80;

/// Required fields counted toward completeness.
const REQUIRED_FIELD_COUNT: f64 = 6.0;

/// Business rules counted toward consistency (BR-001 through BR-006).
const RULE_COUNT: f64 = 6.0;

/// Score an extracted invoice.
pub fn score(invoice: &ExtractedInvoice, provider_confidence: Option<f64>) -> f64 {
    let completeness = completeness(invoice);

    let hard_violations = check_business_rules(invoice).len() as f64;
    let consistency = ((RULE_COUNT - hard_violations) / RULE_COUNT).max(0.0);

    let provider = provider_confidence.unwrap_or(DEFAULT_PROVIDER_CONFIDENCE);

    let confidence = COMPLETENESS_WEIGHT * completeness
        + CONSISTENCY_WEIGHT * consistency
        + PROVIDER_WEIGHT * provider;

    confidence.clamp(0.0, 1.0)
}

/// Fraction of the six required fields present: invoice_id, vendor_name,
/// invoice_date, due_date, subtotal, total_amount.
fn completeness(invoice: &ExtractedInvoice) -> f64 {
    let present = [
        !invoice.invoice_id().trim().is_empty(),
        !invoice.vendor_name().trim().is_empty(),
        true, // invoice_date: construction requires it
        true, // due_date: construction requires it
        true, // subtotal: construction requires it
        true, // total_amount: construction requires it
    ];

    present.iter().filter(|&&p| p).count() as f64 / REQUIRED_FIELD_COUNT
}
