//! Three-layer validation: schema, business rules, confidence.

pub mod confidence;
pub mod rules;
pub mod schema;

pub use confidence::{score, DEFAULT_PROVIDER_CONFIDENCE};
pub use rules::{check_business_rules, rule_warnings};
pub use schema::{parse_invoice, strip_code_fences, validate_schema, SchemaOutcome};

use crate::types::result::ValidationResult;

/// Run the full validation pipeline over raw provider text.
///
/// Layer 1 parses and schema-checks; layer 2 applies business rules; layer 3
/// scores confidence. `is_valid` requires the schema to pass and zero hard
/// violations. Never panics.
pub fn validate_extraction(
    raw_text: &str,
    provider_confidence: Option<f64>,
) -> ValidationResult {
    let (invoice, schema_errors) = validate_schema(raw_text);

    let Some(invoice) = invoice else {
        return ValidationResult {
            is_valid: false,
            schema_valid: false,
            business_rules_valid: false,
            confidence_score: 0.0,
            schema_errors,
            ..Default::default()
        };
    };

    let business_rule_errors = check_business_rules(&invoice);
    let warnings = rule_warnings(&invoice);
    let business_rules_valid = business_rule_errors.is_empty();
    let confidence_score = score(&invoice, provider_confidence);

    ValidationResult {
        is_valid: business_rules_valid,
        schema_valid: true,
        business_rules_valid,
        confidence_score,
        schema_errors: Vec::new(),
        business_rule_errors,
        warnings,
        ..Default::default()
    }
}
