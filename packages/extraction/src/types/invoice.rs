//! Invoice data model.
//!
//! All invariant-bearing types are built through fallible constructors and
//! are immutable afterwards. Deserialization funnels through the same
//! validation as construction, so a wire payload can never bypass the
//! invariants (derived amounts, date ordering, numeric ranges).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Delivery platform vendor types.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum VendorType {
    Ubereats,
    Doordash,
    Grubhub,
    Ifood,
    Rappi,
    #[default]
    Other,
}

impl VendorType {
    /// All known vendor types.
    pub const ALL: [VendorType; 6] = [
        VendorType::Ubereats,
        VendorType::Doordash,
        VendorType::Grubhub,
        VendorType::Ifood,
        VendorType::Rappi,
        VendorType::Other,
    ];

    /// Wire name (lowercase), matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorType::Ubereats => "ubereats",
            VendorType::Doordash => "doordash",
            VendorType::Grubhub => "grubhub",
            VendorType::Ifood => "ifood",
            VendorType::Rappi => "rappi",
            VendorType::Other => "other",
        }
    }
}

impl fmt::Display for VendorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ubereats" => Ok(VendorType::Ubereats),
            "doordash" => Ok(VendorType::Doordash),
            "grubhub" => Ok(VendorType::Grubhub),
            "ifood" => Ok(VendorType::Ifood),
            "rappi" => Ok(VendorType::Rappi),
            "other" => Ok(VendorType::Other),
            other => Err(format!("unknown vendor type: {other}")),
        }
    }
}

/// Supported 3-letter ISO currency codes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Brl,
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Brl => "BRL",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BRL" => Ok(Currency::Brl),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "CAD" => Ok(Currency::Cad),
            "AUD" => Ok(Currency::Aud),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// Collected field-level validation errors from construction.
///
/// One message per failed field, in `field: message` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolations(Vec<String>);

impl SchemaViolations {
    pub fn new(errors: Vec<String>) -> Self {
        Self(errors)
    }

    pub fn errors(&self) -> &[String] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for SchemaViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl std::error::Error for SchemaViolations {}

/// Maximum quantity accepted on a single line item.
const MAX_QUANTITY: i64 = 1000;

/// Maximum length of a line item description.
const MAX_DESCRIPTION_LEN: usize = 500;

/// A single invoice line item.
///
/// `amount` is derived (`quantity * unit_price`, rounded to 2 decimal
/// places) at construction and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct LineItem {
    description: String,
    quantity: u32,
    unit_price: Decimal,
    amount: Decimal,
}

impl LineItem {
    /// Build a line item, computing the derived amount.
    pub fn new(
        description: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
    ) -> std::result::Result<Self, SchemaViolations> {
        LineItemDraft {
            description: Some(description.into()),
            quantity: Some(quantity as i64),
            unit_price: Some(unit_price),
        }
        .try_into()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Derived total for this line: `quantity * unit_price`, 2dp.
    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Wire shape of a line item, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItemDraft {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

impl TryFrom<LineItemDraft> for LineItem {
    type Error = SchemaViolations;

    fn try_from(draft: LineItemDraft) -> std::result::Result<Self, Self::Error> {
        let mut errors = Vec::new();

        let description = draft
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default();
        if description.is_empty() {
            errors.push("description: must not be empty".to_string());
        } else if description.len() > MAX_DESCRIPTION_LEN {
            errors.push(format!(
                "description: exceeds {MAX_DESCRIPTION_LEN} characters"
            ));
        }

        // Quantity defaults to 1 when absent on the wire.
        let quantity = draft.quantity.unwrap_or(1);
        if !(1..=MAX_QUANTITY).contains(&quantity) {
            errors.push(format!(
                "quantity: must be between 1 and {MAX_QUANTITY}, got {quantity}"
            ));
        }

        let unit_price = draft.unit_price.unwrap_or_default();
        if draft.unit_price.is_none() {
            errors.push("unit_price: field required".to_string());
        } else if unit_price < Decimal::ZERO {
            errors.push(format!("unit_price: must not be negative, got {unit_price}"));
        }

        if !errors.is_empty() {
            return Err(SchemaViolations::new(errors));
        }

        let quantity = quantity as u32;
        let amount = (Decimal::from(quantity) * unit_price).round_dp(2);

        Ok(LineItem {
            description,
            quantity,
            unit_price,
            amount,
        })
    }
}

impl<'de> Deserialize<'de> for LineItem {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let draft = LineItemDraft::deserialize(deserializer)?;
        draft.try_into().map_err(serde::de::Error::custom)
    }
}

/// A complete extracted invoice.
///
/// Immutable once built from a validated provider response. Construction
/// enforces `due_date >= invoice_date` and non-negativity of all monetary
/// fields; deserialization runs the same checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ExtractedInvoice {
    invoice_id: String,
    vendor_name: String,
    vendor_type: VendorType,
    invoice_date: NaiveDate,
    due_date: NaiveDate,
    currency: Currency,
    line_items: Vec<LineItem>,
    subtotal: Decimal,
    tax_amount: Decimal,
    commission_rate: Decimal,
    commission_amount: Decimal,
    total_amount: Decimal,
}

impl ExtractedInvoice {
    pub fn invoice_id(&self) -> &str {
        &self.invoice_id
    }

    pub fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    pub fn vendor_type(&self) -> VendorType {
        self.vendor_type
    }

    pub fn invoice_date(&self) -> NaiveDate {
        self.invoice_date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn line_item_count(&self) -> usize {
        self.line_items.len()
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn tax_amount(&self) -> Decimal {
        self.tax_amount
    }

    pub fn commission_rate(&self) -> Decimal {
        self.commission_rate
    }

    pub fn commission_amount(&self) -> Decimal {
        self.commission_amount
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    /// Commission implied by the extracted figures: `subtotal * rate`, 2dp.
    pub fn expected_commission(&self) -> Decimal {
        (self.subtotal * self.commission_rate).round_dp(2)
    }

    /// Sum of derived line item amounts.
    pub fn line_items_total(&self) -> Decimal {
        self.line_items.iter().map(|item| item.amount()).sum()
    }
}

/// Wire shape of an invoice, before validation.
///
/// All fields are lenient so that every violation can be collected rather
/// than failing on the first. Null optional decimals coerce to zero, the
/// way providers commonly emit them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceDraft {
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub vendor_type: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItemDraft>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub tax_amount: Option<Decimal>,
    #[serde(default)]
    pub commission_rate: Option<Decimal>,
    #[serde(default)]
    pub commission_amount: Option<Decimal>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
}

fn parse_date(field: &str, value: Option<&str>, errors: &mut Vec<String>) -> Option<NaiveDate> {
    match value {
        None => {
            errors.push(format!("{field}: field required"));
            None
        }
        Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(format!("{field}: invalid date '{raw}', expected YYYY-MM-DD"));
                None
            }
        },
    }
}

fn require_amount(
    field: &str,
    value: Option<Decimal>,
    errors: &mut Vec<String>,
) -> Decimal {
    match value {
        None => {
            errors.push(format!("{field}: field required"));
            Decimal::ZERO
        }
        Some(v) if v < Decimal::ZERO => {
            errors.push(format!("{field}: must not be negative, got {v}"));
            Decimal::ZERO
        }
        Some(v) => v,
    }
}

fn optional_amount(
    field: &str,
    value: Option<Decimal>,
    errors: &mut Vec<String>,
) -> Decimal {
    // Absent or null optional decimals coerce to zero.
    let v = value.unwrap_or_default();
    if v < Decimal::ZERO {
        errors.push(format!("{field}: must not be negative, got {v}"));
        Decimal::ZERO
    } else {
        v
    }
}

impl TryFrom<InvoiceDraft> for ExtractedInvoice {
    type Error = SchemaViolations;

    fn try_from(draft: InvoiceDraft) -> std::result::Result<Self, Self::Error> {
        let mut errors = Vec::new();

        let invoice_id = draft
            .invoice_id
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        if invoice_id.is_empty() {
            errors.push("invoice_id: must not be empty".to_string());
        } else if invoice_id.len() > 50 {
            errors.push("invoice_id: exceeds 50 characters".to_string());
        }

        let vendor_name = draft
            .vendor_name
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        if vendor_name.is_empty() {
            errors.push("vendor_name: must not be empty".to_string());
        } else if vendor_name.len() > 200 {
            errors.push("vendor_name: exceeds 200 characters".to_string());
        }

        let vendor_type = match draft.vendor_type.as_deref() {
            None => VendorType::Other,
            Some(raw) => match raw.parse() {
                Ok(vt) => vt,
                Err(e) => {
                    errors.push(format!("vendor_type: {e}"));
                    VendorType::Other
                }
            },
        };

        let invoice_date = parse_date("invoice_date", draft.invoice_date.as_deref(), &mut errors);
        let due_date = parse_date("due_date", draft.due_date.as_deref(), &mut errors);

        if let (Some(invoice_date), Some(due_date)) = (invoice_date, due_date) {
            if due_date < invoice_date {
                errors.push(format!(
                    "due_date: {due_date} cannot be before invoice_date {invoice_date}"
                ));
            }
        }

        let currency = match draft.currency.as_deref() {
            None => Currency::default(),
            Some(raw) => match raw.parse() {
                Ok(c) => c,
                Err(e) => {
                    errors.push(format!("currency: {e}"));
                    Currency::default()
                }
            },
        };

        let mut line_items = Vec::with_capacity(draft.line_items.len());
        for (idx, item) in draft.line_items.into_iter().enumerate() {
            match LineItem::try_from(item) {
                Ok(item) => line_items.push(item),
                Err(violations) => {
                    for message in violations.into_errors() {
                        errors.push(format!("line_items[{idx}].{message}"));
                    }
                }
            }
        }

        let subtotal = require_amount("subtotal", draft.subtotal, &mut errors);
        let total_amount = require_amount("total_amount", draft.total_amount, &mut errors);
        let tax_amount = optional_amount("tax_amount", draft.tax_amount, &mut errors);
        let commission_amount =
            optional_amount("commission_amount", draft.commission_amount, &mut errors);

        let commission_rate = draft.commission_rate.unwrap_or_default();
        if commission_rate < Decimal::ZERO || commission_rate > Decimal::ONE {
            errors.push(format!(
                "commission_rate: must be between 0 and 1, got {commission_rate}"
            ));
        }

        if !errors.is_empty() {
            return Err(SchemaViolations::new(errors));
        }

        Ok(ExtractedInvoice {
            invoice_id,
            vendor_name,
            vendor_type,
            // Both dates parsed or errors would be non-empty.
            invoice_date: invoice_date.unwrap_or_default(),
            due_date: due_date.unwrap_or_default(),
            currency,
            line_items,
            subtotal,
            tax_amount,
            commission_rate,
            commission_amount,
            total_amount,
        })
    }
}

impl<'de> Deserialize<'de> for ExtractedInvoice {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let draft = InvoiceDraft::deserialize(deserializer)?;
        draft.try_into().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn valid_draft() -> InvoiceDraft {
        InvoiceDraft {
            invoice_id: Some("UE-2026-001234".to_string()),
            vendor_name: Some("Test Restaurant ABC".to_string()),
            vendor_type: Some("ubereats".to_string()),
            invoice_date: Some("2026-01-15".to_string()),
            due_date: Some("2026-01-29".to_string()),
            currency: Some("USD".to_string()),
            line_items: vec![LineItemDraft {
                description: Some("Order Sales".to_string()),
                quantity: Some(1),
                unit_price: Some(dec("1480.00")),
            }],
            subtotal: Some(dec("1480.00")),
            tax_amount: Some(dec("0.00")),
            commission_rate: Some(dec("0.25")),
            commission_amount: Some(dec("370.00")),
            total_amount: Some(dec("1110.00")),
        }
    }

    #[test]
    fn line_item_amount_is_derived_at_construction() {
        let item = LineItem::new("Delivery Fee", 3, dec("15.99")).unwrap();
        assert_eq!(item.amount(), dec("47.97"));
    }

    #[test]
    fn line_item_amount_rounds_to_two_places() {
        let item = LineItem::new("Split charge", 3, dec("0.333")).unwrap();
        assert_eq!(item.amount(), dec("1.00"));
    }

    #[test]
    fn line_item_quantity_defaults_to_one() {
        let item: LineItem = LineItemDraft {
            description: Some("Service Fee".to_string()),
            quantity: None,
            unit_price: Some(dec("10.00")),
        }
        .try_into()
        .unwrap();
        assert_eq!(item.quantity(), 1);
        assert_eq!(item.amount(), dec("10.00"));
    }

    #[test]
    fn line_item_rejects_empty_description_and_negative_price() {
        let result: std::result::Result<LineItem, _> = LineItemDraft {
            description: Some("   ".to_string()),
            quantity: Some(0),
            unit_price: Some(dec("-1.00")),
        }
        .try_into();
        let errors = result.unwrap_err().into_errors();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn invoice_builds_from_valid_draft() {
        let invoice: ExtractedInvoice = valid_draft().try_into().unwrap();
        assert_eq!(invoice.invoice_id(), "UE-2026-001234");
        assert_eq!(invoice.vendor_type(), VendorType::Ubereats);
        assert_eq!(invoice.expected_commission(), dec("370.00"));
        assert_eq!(invoice.line_item_count(), 1);
    }

    #[test]
    fn invoice_rejects_due_date_before_invoice_date() {
        let mut draft = valid_draft();
        draft.due_date = Some("2026-01-01".to_string());
        let err = ExtractedInvoice::try_from(draft).unwrap_err();
        assert!(err.to_string().contains("due_date"));
    }

    #[test]
    fn invoice_allows_due_date_equal_to_invoice_date() {
        let mut draft = valid_draft();
        draft.due_date = draft.invoice_date.clone();
        assert!(ExtractedInvoice::try_from(draft).is_ok());
    }

    #[test]
    fn invoice_collects_all_violations() {
        let draft = InvoiceDraft {
            invoice_id: None,
            vendor_name: None,
            invoice_date: Some("not-a-date".to_string()),
            ..Default::default()
        };
        let errors = ExtractedInvoice::try_from(draft).unwrap_err().into_errors();
        // invoice_id, vendor_name, invoice_date, due_date, subtotal, total_amount
        assert!(errors.len() >= 5, "expected many errors, got: {errors:?}");
    }

    #[test]
    fn null_optional_decimals_coerce_to_zero() {
        let json = r#"{
            "invoice_id": "UE-2026-000001",
            "vendor_name": "Vendor",
            "invoice_date": "2026-01-01",
            "due_date": "2026-01-31",
            "subtotal": "100.00",
            "tax_amount": null,
            "commission_rate": null,
            "commission_amount": null,
            "total_amount": "100.00"
        }"#;
        let invoice: ExtractedInvoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.tax_amount(), Decimal::ZERO);
        assert_eq!(invoice.commission_rate(), Decimal::ZERO);
        assert_eq!(invoice.vendor_type(), VendorType::Other);
        assert_eq!(invoice.currency(), Currency::Brl);
    }

    #[test]
    fn invoice_round_trips_through_serde() {
        let invoice: ExtractedInvoice = valid_draft().try_into().unwrap();
        let json = serde_json::to_string(&invoice).unwrap();
        let back: ExtractedInvoice = serde_json::from_str(&json).unwrap();
        assert_eq!(invoice, back);
    }

    #[test]
    fn commission_rate_above_one_is_rejected() {
        let mut draft = valid_draft();
        draft.commission_rate = Some(dec("1.5"));
        assert!(ExtractedInvoice::try_from(draft).is_err());
    }

    #[test]
    fn vendor_type_parses_wire_names() {
        assert_eq!("ifood".parse::<VendorType>().unwrap(), VendorType::Ifood);
        assert_eq!("RAPPI".parse::<VendorType>().unwrap(), VendorType::Rappi);
        assert!("uber eats".parse::<VendorType>().is_err());
    }

    proptest! {
        #[test]
        fn line_item_amount_always_matches_formula(
            quantity in 1u32..=1000,
            price_cents in 0i64..=10_000_00,
        ) {
            let unit_price = Decimal::new(price_cents, 2);
            let item = LineItem::new("prop item", quantity, unit_price).unwrap();
            let expected = (Decimal::from(quantity) * unit_price).round_dp(2);
            prop_assert_eq!(item.amount(), expected);
        }
    }
}
