//! Loan data model
//!
//! Types shared between the source clients, the reconciler and the renderer:
//! - [`RawRecord`]: one row of the record table (Airtable)
//! - [`LoanProfile`]: loan-servicing payload (Vesta)
//! - [`ParsedDocument`]: settlement-agent data extracted by the document parser (Parseur)
//! - [`CanonicalRow`]: the merged per-loan output row
//! - [`ColumnMap`]: template column layout

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Record-table field names read by the reconciler
pub mod fields {
    /// Linked-record lookup holding the loan number
    pub const LINKED_LOAN_NUMBER: &str = "Loan Number (from Data Input)";
    /// Record name; doubles as borrower name and loan-number fallback
    pub const NAME: &str = "Name";
    pub const LOAN_SIZE: &str = "Loan Size";
    pub const FUNDING_DATE: &str = "Funding Date";
    pub const INVESTOR: &str = "Investor";
}

/// Loan number used when a record carries neither a linked loan number nor a name
pub const LOAN_NUMBER_PLACEHOLDER: &str = "UNKNOWN";

/// Record field decoding errors
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("unsupported {kind} value in field '{field}'")]
    UnsupportedValue { field: String, kind: &'static str },
}

/// Spreadsheet cell value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Text value, or `None` when blank
    pub fn text(value: Option<&str>) -> Option<Self> {
        value
            .filter(|v| !v.trim().is_empty())
            .map(|v| CellValue::Text(v.to_string()))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One record from the record table
///
/// Immutable once fetched. Field values are strings, numbers, booleans or
/// lists (linked-record lookups).
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Record id assigned by the record table
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Derive the loan number
    ///
    /// First element of the linked loan-number lookup, else the record name,
    /// else [`LOAN_NUMBER_PLACEHOLDER`]. Never empty.
    pub fn loan_number(&self) -> String {
        self.linked_loan_number()
            .or_else(|| self.fields.get(fields::NAME).and_then(json_text))
            .unwrap_or_else(|| LOAN_NUMBER_PLACEHOLDER.to_string())
    }

    fn linked_loan_number(&self) -> Option<String> {
        match self.fields.get(fields::LINKED_LOAN_NUMBER)? {
            Value::Array(items) => items.first().and_then(json_text),
            _ => None,
        }
    }

    /// Scalar value of a field, unwrapping single-element lookup lists
    ///
    /// Missing, `null`, blank and empty-list values are absent. Objects and
    /// nested lists cannot be placed in a cell and are rejected.
    pub fn scalar(&self, field: &str) -> Result<Option<CellValue>, RecordError> {
        let value = match self.fields.get(field) {
            None => return Ok(None),
            Some(Value::Array(items)) => match items.first() {
                None => return Ok(None),
                Some(Value::Array(_)) => {
                    return Err(RecordError::UnsupportedValue {
                        field: field.to_string(),
                        kind: "nested list",
                    })
                }
                Some(first) => first,
            },
            Some(other) => other,
        };

        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(CellValue::text(Some(s))),
            Value::Number(n) => Ok(n.as_f64().map(CellValue::Number)),
            Value::Bool(b) => Ok(Some(CellValue::Bool(*b))),
            Value::Object(_) => Err(RecordError::UnsupportedValue {
                field: field.to_string(),
                kind: "object",
            }),
            Value::Array(_) => Err(RecordError::UnsupportedValue {
                field: field.to_string(),
                kind: "nested list",
            }),
        }
    }
}

/// Non-blank text of a string or number value
fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts strings and numbers (phone numbers and zip codes arrive as either)
fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(json_text))
}

/// Loan-servicing payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanProfile {
    #[serde(default)]
    pub subject_property: Option<SubjectProperty>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectProperty {
    #[serde(default)]
    pub address: Option<PropertyAddress>,
}

/// Subject-property address; blank components deserialize as `None`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAddress {
    #[serde(default, deserialize_with = "de_opt_text")]
    pub line: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub zip_code: Option<String>,
}

impl LoanProfile {
    /// Subject-property address, empty when the payload has none
    pub fn address(&self) -> PropertyAddress {
        self.subject_property
            .as_ref()
            .and_then(|p| p.address.clone())
            .unwrap_or_default()
    }

    /// True when the payload carries no usable address component
    pub fn is_empty(&self) -> bool {
        self.address() == PropertyAddress::default()
    }
}

/// Settlement-agent fields parsed out of an inbound document
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParsedDocument {
    #[serde(default, deserialize_with = "de_opt_text")]
    pub settlement_agent: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub settlement_phone: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub settlement_agent_email: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub document_name: Option<String>,
}

impl ParsedDocument {
    /// True when the parser extracted nothing usable
    pub fn is_empty(&self) -> bool {
        self.settlement_agent.is_none()
            && self.settlement_phone.is_none()
            && self.settlement_agent_email.is_none()
            && self.document_name.is_none()
    }
}

/// Canonical output fields, in template order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    ChannelIdentifier,
    LoanNumber,
    LoanAmount,
    BorrowerName,
    PropertyAddressLine1,
    PropertyState,
    PropertyZipCode,
    PropertyCounty,
    TriggerDate,
    OrganizationName,
    OrganizationPhone,
    OrganizationEmail,
    InvestorName,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::ChannelIdentifier,
        Field::LoanNumber,
        Field::LoanAmount,
        Field::BorrowerName,
        Field::PropertyAddressLine1,
        Field::PropertyState,
        Field::PropertyZipCode,
        Field::PropertyCounty,
        Field::TriggerDate,
        Field::OrganizationName,
        Field::OrganizationPhone,
        Field::OrganizationEmail,
        Field::InvestorName,
    ];

    /// Template header label
    pub fn label(self) -> &'static str {
        match self {
            Field::ChannelIdentifier => "Channel Identifier",
            Field::LoanNumber => "Loan Number",
            Field::LoanAmount => "Loan Amount",
            Field::BorrowerName => "Borrower Name",
            Field::PropertyAddressLine1 => "Property Address Line 1",
            Field::PropertyState => "Property State",
            Field::PropertyZipCode => "Property Zip Code",
            Field::PropertyCounty => "Property County",
            Field::TriggerDate => "Trigger Date",
            Field::OrganizationName => "Organization Name",
            Field::OrganizationPhone => "Organization Phone #",
            Field::OrganizationEmail => "Organization Email",
            Field::InvestorName => "Investor Name",
        }
    }

    pub fn from_label(label: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.label() == label)
    }

    /// Default 1-based template column
    pub fn default_column(self) -> u32 {
        match self {
            Field::ChannelIdentifier => 1,
            Field::LoanNumber => 2,
            Field::LoanAmount => 5,
            Field::BorrowerName => 14,
            Field::PropertyAddressLine1 => 15,
            Field::PropertyState => 20,
            Field::PropertyZipCode => 21,
            Field::PropertyCounty => 22,
            Field::TriggerDate => 24,
            Field::OrganizationName => 34,
            Field::OrganizationPhone => 36,
            Field::OrganizationEmail => 38,
            Field::InvestorName => 46,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Merged per-loan output row
///
/// Loan number and channel identifier are always present. Every other field
/// is written at most once; unset fields stay unset.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    loan_number: String,
    values: BTreeMap<Field, CellValue>,
}

impl CanonicalRow {
    pub fn new(channel_identifier: &str, loan_number: &str) -> Self {
        let mut values = BTreeMap::new();
        values.insert(
            Field::ChannelIdentifier,
            CellValue::Text(channel_identifier.to_string()),
        );
        values.insert(Field::LoanNumber, CellValue::Text(loan_number.to_string()));
        Self {
            loan_number: loan_number.to_string(),
            values,
        }
    }

    pub fn loan_number(&self) -> &str {
        &self.loan_number
    }

    /// Set a field unless it already holds a value
    ///
    /// Returns `false` (and leaves the row unchanged) when the field was set.
    pub fn set(&mut self, field: Field, value: CellValue) -> bool {
        if self.values.contains_key(&field) {
            return false;
        }
        self.values.insert(field, value);
        true
    }

    /// Set a text field when `value` is present and non-blank
    pub fn set_text(&mut self, field: Field, value: Option<&str>) {
        if let Some(value) = CellValue::text(value) {
            self.set(field, value);
        }
    }

    pub fn get(&self, field: Field) -> Option<&CellValue> {
        self.values.get(&field)
    }

    /// Set fields in template order
    pub fn iter(&self) -> impl Iterator<Item = (Field, &CellValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }
}

/// Field → 1-based template column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    columns: BTreeMap<Field, u32>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            columns: Field::ALL
                .into_iter()
                .map(|f| (f, f.default_column()))
                .collect(),
        }
    }
}

impl ColumnMap {
    pub fn column(&self, field: Field) -> u32 {
        self.columns
            .get(&field)
            .copied()
            .unwrap_or_else(|| field.default_column())
    }

    /// Move a field to another column; columns are 1-based
    pub fn with_column(mut self, field: Field, column: u32) -> Option<Self> {
        if column == 0 {
            return None;
        }
        self.columns.insert(field, column);
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> RawRecord {
        serde_json::from_value(json!({ "id": "rec1", "fields": fields })).unwrap()
    }

    #[test]
    fn test_loan_number_from_linked_field() {
        let r = record(json!({
            "Loan Number (from Data Input)": ["L100", "L200"],
            "Name": "Jane Doe"
        }));
        assert_eq!(r.loan_number(), "L100");
    }

    #[test]
    fn test_loan_number_numeric_link() {
        let r = record(json!({ "Loan Number (from Data Input)": [2024001] }));
        assert_eq!(r.loan_number(), "2024001");
    }

    #[test]
    fn test_loan_number_falls_back_to_name() {
        let r = record(json!({ "Loan Number (from Data Input)": [], "Name": "Jane Doe" }));
        assert_eq!(r.loan_number(), "Jane Doe");

        let r = record(json!({ "Loan Number (from Data Input)": "L100", "Name": "Jane Doe" }));
        assert_eq!(r.loan_number(), "Jane Doe");
    }

    #[test]
    fn test_loan_number_placeholder() {
        assert_eq!(record(json!({})).loan_number(), LOAN_NUMBER_PLACEHOLDER);
        assert_eq!(record(json!({ "Name": "  " })).loan_number(), LOAN_NUMBER_PLACEHOLDER);
    }

    #[test]
    fn test_scalar_unwraps_lookup_list() {
        let r = record(json!({ "Loan Size": [350000], "Investor": "Fannie" }));
        assert_eq!(r.scalar("Loan Size"), Ok(Some(CellValue::Number(350000.0))));
        assert_eq!(
            r.scalar("Investor"),
            Ok(Some(CellValue::Text("Fannie".to_string())))
        );
        assert_eq!(r.scalar("Funding Date"), Ok(None));
    }

    #[test]
    fn test_scalar_rejects_objects() {
        let r = record(json!({ "Loan Size": { "amount": 1 } }));
        assert!(matches!(
            r.scalar("Loan Size"),
            Err(RecordError::UnsupportedValue { kind: "object", .. })
        ));
    }

    #[test]
    fn test_canonical_row_first_writer_wins() {
        let mut row = CanonicalRow::new("INDECOMM", "L100");
        assert!(row.set(Field::PropertyState, CellValue::Text("CA".into())));
        assert!(!row.set(Field::PropertyState, CellValue::Text("NV".into())));
        assert_eq!(
            row.get(Field::PropertyState),
            Some(&CellValue::Text("CA".into()))
        );
        assert!(!row.set(Field::LoanNumber, CellValue::Text("other".into())));
        assert_eq!(row.loan_number(), "L100");
    }

    #[test]
    fn test_set_text_skips_blank() {
        let mut row = CanonicalRow::new("INDECOMM", "L100");
        row.set_text(Field::OrganizationEmail, Some(""));
        row.set_text(Field::OrganizationPhone, None);
        assert!(row.get(Field::OrganizationEmail).is_none());
        assert!(row.get(Field::OrganizationPhone).is_none());
    }

    #[test]
    fn test_property_address_blank_components() {
        let profile: LoanProfile = serde_json::from_value(json!({
            "subjectProperty": { "address": {
                "line": "", "city": "Beverly Hills", "state": "CA", "zipCode": 90210
            }}
        }))
        .unwrap();
        let address = profile.address();
        assert_eq!(address.line, None);
        assert_eq!(address.zip_code.as_deref(), Some("90210"));
    }

    #[test]
    fn test_profile_without_address_components_is_empty() {
        let empty: LoanProfile = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_empty());

        let blank: LoanProfile = serde_json::from_value(json!({
            "loanNumber": "L1",
            "subjectProperty": { "address": { "line": " ", "city": null } }
        }))
        .unwrap();
        assert!(blank.is_empty());

        let zip_only: LoanProfile = serde_json::from_value(json!({
            "subjectProperty": { "address": { "zipCode": "90210" } }
        }))
        .unwrap();
        assert!(!zip_only.is_empty());
    }

    #[test]
    fn test_parsed_document_with_only_unknown_keys_is_empty() {
        let doc: ParsedDocument =
            serde_json::from_value(json!({ "closing_date": "2026-09-30", "pages": 4 })).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_field_labels_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_label(field.label()), Some(field));
        }
        assert_eq!(Field::from_label("Nope"), None);
    }

    #[test]
    fn test_column_map_rejects_zero() {
        assert!(ColumnMap::default()
            .with_column(Field::InvestorName, 0)
            .is_none());
        let map = ColumnMap::default()
            .with_column(Field::InvestorName, 47)
            .unwrap();
        assert_eq!(map.column(Field::InvestorName), 47);
        assert_eq!(map.column(Field::LoanNumber), 2);
    }
}
