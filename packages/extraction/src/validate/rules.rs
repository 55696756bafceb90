//! Layer 2: cross-field business rules.
//!
//! Hard violations invalidate the record; warnings never block success.
//! Tolerances are fixed and part of the contract:
//!
//! - BR-001 total floor: `total >= subtotal + tax - commission - 0.05`
//!   (payout invoices deduct the platform commission; totals above the
//!   floor are normal due to added fees). Hard.
//! - BR-002 date ordering: enforced at the schema layer.
//! - BR-003 commission consistency: `|commission - subtotal*rate| <= 0.02`.
//!   Hard.
//! - BR-004 line-item sum: `|sum(amounts) - subtotal| <= 0.10`. Warning.
//! - BR-005 non-negativity: enforced at the schema layer.
//! - BR-006 identifier format: warning.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::types::invoice::ExtractedInvoice;

fn total_tolerance() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn commission_tolerance() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn line_items_tolerance() -> Decimal {
    Decimal::new(10, 2) // 0.10
}

fn invoice_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z]{2,4}-\d{4}-\d{4,8}$").expect("invoice id pattern is valid")
    })
}

/// Check hard business rules. Empty result means the invoice is consistent.
pub fn check_business_rules(invoice: &ExtractedInvoice) -> Vec<String> {
    let mut violations = Vec::new();

    // BR-001: the payout floor. A total below subtotal + tax - commission
    // signals missing data; a total above it is normal (delivery fees,
    // service fees, tips).
    let floor = invoice.subtotal() + invoice.tax_amount() - invoice.commission_amount();
    if invoice.total_amount() < floor - total_tolerance() {
        violations.push(format!(
            "BR-001: total_amount ({}) is below subtotal + tax_amount - commission_amount \
             ({}), possible missing data",
            invoice.total_amount(),
            floor
        ));
    }

    // BR-002: date ordering is a construction invariant, not re-checked.

    // BR-003: commission must match subtotal * rate.
    let expected = invoice.expected_commission();
    let difference = (invoice.commission_amount() - expected).abs();
    if difference > commission_tolerance() {
        violations.push(format!(
            "BR-003: commission_amount ({}) does not match subtotal * commission_rate \
             ({}), difference: {}",
            invoice.commission_amount(),
            expected,
            difference
        ));
    }

    // BR-005: non-negativity is a construction invariant.

    violations
}

/// Soft violations. Reported but never block success.
pub fn rule_warnings(invoice: &ExtractedInvoice) -> Vec<String> {
    let mut warnings = Vec::new();

    // BR-004: line items should sum to the subtotal.
    if !invoice.line_items().is_empty() {
        let items_total = invoice.line_items_total();
        let difference = (items_total - invoice.subtotal()).abs();
        if difference > line_items_tolerance() {
            warnings.push(format!(
                "BR-004: line items sum ({}) differs from subtotal ({}) by {}",
                items_total,
                invoice.subtotal(),
                difference
            ));
        }
    }

    // BR-006: identifier format is informational only.
    if !invoice_id_pattern().is_match(invoice.invoice_id()) {
        warnings.push(format!(
            "BR-006: invoice_id '{}' does not match the expected format (e.g. UE-2026-001234)",
            invoice.invoice_id()
        ));
    }

    warnings
}
