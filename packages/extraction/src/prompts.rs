//! Extraction prompts.
//!
//! One template per vendor platform, each with a `{schema}` placeholder the
//! builder fills with the JSON Schema of the invoice wire shape. Unknown
//! vendors fall back to the generic template.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::types::invoice::{ExtractedInvoice, VendorType};

/// Shared output rules appended to every vendor template.
const OUTPUT_RULES: &str = r#"Rules:
1. Output ONLY a single JSON object, no prose and no markdown fences.
2. Dates must be formatted YYYY-MM-DD.
3. Monetary values must be decimal strings with 2 decimal places (e.g. "1480.00").
4. commission_rate is a decimal fraction between 0 and 1 (e.g. "0.25" for 25%).
5. Use null for optional fields that are not present on the invoice.
6. vendor_type must be one of: ubereats, doordash, grubhub, ifood, rappi, other.
7. currency must be one of: BRL, USD, EUR, GBP, CAD, AUD.

The JSON object must conform to this schema:
{schema}"#;

/// Prompt for UberEats restaurant payout invoices.
pub const UBEREATS_PROMPT: &str = r#"You are extracting structured data from an UberEats restaurant invoice.

UberEats invoices are payout statements: the total paid to the restaurant is
the order subtotal plus collected fees, minus the platform commission
(typically 15-30% of the subtotal). The invoice identifier starts with "UE-".

Extract every line item (order sales, delivery fees, promotions, adjustments)
with its quantity and unit price.

"#;

/// Prompt for DoorDash merchant invoices.
pub const DOORDASH_PROMPT: &str = r#"You are extracting structured data from a DoorDash merchant invoice.

DoorDash invoices list order subtotals, tips, and delivery fees as separate
line items, then deduct the platform commission from the payout total. The
invoice identifier starts with "DD-".

"#;

/// Prompt for Grubhub restaurant statements.
pub const GRUBHUB_PROMPT: &str = r#"You are extracting structured data from a Grubhub restaurant statement.

Grubhub statements show order sales and marketing fees, with the commission
deducted from the amount due to the restaurant. The invoice identifier
starts with "GH-".

"#;

/// Prompt for iFood invoices (Brazilian market, Portuguese labels).
pub const IFOOD_PROMPT: &str = r#"You are extracting structured data from an iFood invoice.

iFood invoices are written in Portuguese. Common labels: "Vendas de Pedidos"
(order sales), "Taxa de Entrega" (delivery fee), "Comissão" (commission),
"Total a Receber" (payout total). Amounts are in BRL. The invoice identifier
starts with "IF-".

Translate nothing: keep line item descriptions in their original language.

"#;

/// Prompt for Rappi invoices (Latin American market, Spanish labels).
pub const RAPPI_PROMPT: &str = r#"You are extracting structured data from a Rappi invoice.

Rappi invoices are written in Spanish. Common labels: "Ventas" (sales),
"Tarifa de Entrega" (delivery fee), "Comisión" (commission). The invoice
identifier starts with "RP-".

Keep line item descriptions in their original language.

"#;

/// Fallback prompt for unrecognized platforms.
pub const GENERIC_PROMPT: &str = r#"You are extracting structured data from a scanned invoice image.

Identify the invoice number, vendor, dates, currency, line items, and
financial totals. If the platform cannot be identified, set vendor_type to
"other".

"#;

/// Vendor template, generic fallback for `Other`.
pub fn template_for(vendor: VendorType) -> &'static str {
    match vendor {
        VendorType::Ubereats => UBEREATS_PROMPT,
        VendorType::Doordash => DOORDASH_PROMPT,
        VendorType::Grubhub => GRUBHUB_PROMPT,
        VendorType::Ifood => IFOOD_PROMPT,
        VendorType::Rappi => RAPPI_PROMPT,
        VendorType::Other => GENERIC_PROMPT,
    }
}

/// JSON Schema of the invoice wire shape, for prompt injection.
pub fn invoice_schema_json() -> Result<String> {
    let schema = schemars::schema_for!(ExtractedInvoice);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Build the complete extraction prompt for a vendor.
pub fn build_extraction_prompt(vendor: VendorType) -> Result<String> {
    let schema = invoice_schema_json()?;
    let rules = OUTPUT_RULES.replace("{schema}", &schema);
    Ok(format!("{}{}", template_for(vendor), rules))
}

/// Hash of a vendor's full prompt, for versioning extraction runs.
pub fn extraction_prompt_hash(vendor: VendorType) -> Result<String> {
    let prompt = build_extraction_prompt(vendor)?;
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
