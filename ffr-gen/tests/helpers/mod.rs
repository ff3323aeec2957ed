//! Test Helper Utilities
//!
//! Fixture implementations of the source and geocoder traits, plus template
//! workbook helpers. No network access.

#![allow(dead_code)]

use async_trait::async_trait;
use ffr_common::config::{CliOverrides, Config, TomlConfig};
use ffr_common::model::{LoanProfile, ParsedDocument};
use ffr_common::{Field, RawRecord};
use ffr_gen::geocode::{GeocodeError, Geocoder};
use ffr_gen::sources::{DocumentSource, LoanDataSource, RecordTable, SourceError};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Record-table fixture
pub struct FixtureTable {
    pub records: Vec<RawRecord>,
    pub fail: bool,
}

#[async_trait]
impl RecordTable for FixtureTable {
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, SourceError> {
        if self.fail {
            return Err(SourceError::Api {
                status: 401,
                body: "AUTHENTICATION_REQUIRED".to_string(),
            });
        }
        Ok(self.records.clone())
    }
}

/// Loan-data fixture: known profiles, loans that fail upstream, everything else not found
#[derive(Default)]
pub struct FixtureLoans {
    pub profiles: HashMap<String, LoanProfile>,
    pub failing: HashSet<String>,
}

impl FixtureLoans {
    pub fn with(mut self, loan_number: &str, profile: LoanProfile) -> Self {
        self.profiles.insert(loan_number.to_string(), profile);
        self
    }

    pub fn failing(mut self, loan_number: &str) -> Self {
        self.failing.insert(loan_number.to_string());
        self
    }
}

#[async_trait]
impl LoanDataSource for FixtureLoans {
    async fn fetch_loan(&self, loan_number: &str) -> Result<LoanProfile, SourceError> {
        if self.failing.contains(loan_number) {
            return Err(SourceError::Api {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.profiles
            .get(loan_number)
            .cloned()
            .ok_or_else(|| SourceError::NotFound("Loan not found in Vesta".to_string()))
    }
}

/// Document fixture: known documents, everything else not found
#[derive(Default)]
pub struct FixtureDocuments {
    pub documents: HashMap<String, ParsedDocument>,
}

impl FixtureDocuments {
    pub fn with(mut self, loan_number: &str, document: ParsedDocument) -> Self {
        self.documents.insert(loan_number.to_string(), document);
        self
    }
}

#[async_trait]
impl DocumentSource for FixtureDocuments {
    async fn find_document(&self, loan_number: &str) -> Result<ParsedDocument, SourceError> {
        self.documents
            .get(loan_number)
            .cloned()
            .ok_or_else(|| SourceError::NotFound("No matching document found".to_string()))
    }
}

/// Geocoder fixture: exact query → raw county; records queries in order
#[derive(Default)]
pub struct FixtureGeocoder {
    pub counties: HashMap<String, String>,
    pub queries: Mutex<Vec<String>>,
}

impl FixtureGeocoder {
    pub fn with(mut self, query: &str, county: &str) -> Self {
        self.counties.insert(query.to_string(), county.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for FixtureGeocoder {
    async fn county(&self, query: &str) -> Result<Option<String>, GeocodeError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.counties.get(query).cloned())
    }
}

/// Record-table row with a linked loan number plus extra fields
pub fn record(loan_number: &str, extra: Value) -> RawRecord {
    let mut fields = json!({ "Loan Number (from Data Input)": [loan_number] });
    if let (Some(target), Value::Object(extra)) = (fields.as_object_mut(), extra) {
        target.extend(extra);
    }
    serde_json::from_value(json!({ "id": format!("rec{}", loan_number), "fields": fields }))
        .unwrap()
}

pub fn profile(line: Option<&str>, city: Option<&str>, state: Option<&str>, zip: Option<&str>) -> LoanProfile {
    serde_json::from_value(json!({
        "subjectProperty": {
            "address": { "line": line, "city": city, "state": state, "zipCode": zip }
        }
    }))
    .unwrap()
}

pub fn document(agent: &str, phone: &str, email: &str) -> ParsedDocument {
    ParsedDocument {
        settlement_agent: Some(agent.to_string()),
        settlement_phone: Some(phone.to_string()),
        settlement_agent_email: Some(email.to_string()),
        document_name: None,
    }
}

/// Template workbook with header labels in row 1 and extra pre-filled cells
pub fn write_template(path: &Path, prefilled: &[((u32, u32), &str)]) {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book.get_sheet_mut(&0).unwrap();
    for field in Field::ALL {
        sheet
            .get_cell_mut((field.default_column(), 1))
            .set_value_string(field.label());
    }
    for (coordinate, value) in prefilled {
        sheet.get_cell_mut(*coordinate).set_value_string(*value);
    }
    umya_spreadsheet::writer::xlsx::write(&book, path).unwrap();
}

/// Cell text of the first worksheet
pub fn read_cell(path: &Path, column: u32, row: u32) -> String {
    let book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
    book.get_sheet(&0).unwrap().get_value((column, row))
}

/// Config pointing at a template and output directory
pub fn test_config(template: PathBuf, output_dir: PathBuf) -> Config {
    Config::resolve(
        TomlConfig::default(),
        CliOverrides {
            airtable_token: Some("pat-test".to_string()),
            template: Some(template),
            output_dir: Some(output_dir),
            ..Default::default()
        },
    )
    .unwrap()
}
