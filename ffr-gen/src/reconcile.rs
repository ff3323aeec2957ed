//! Per-loan reconciliation
//!
//! Merges one record-table row with the optional loan profile and parsed
//! settlement document into a [`CanonicalRow`]. Each source owns a disjoint
//! group of fields, so there is no conflict resolution: the first (and only)
//! writer of a field wins. Gaps are recorded in [`Diagnostics`]; they never
//! stop the row from being produced.

use crate::geocode::{CountyResolver, Geocoder};
use crate::sources::{DocumentSource, LoanDataSource, SourceError};
use ffr_common::model::{fields, LoanProfile, ParsedDocument, RecordError};
use ffr_common::{CanonicalRow, Diagnostics, Field, RawRecord};
use thiserror::Error;
use tracing::info;

/// Diagnostic field tags
const TAG_VESTA: &str = "Vesta API";
const TAG_PARSEUR: &str = "Parseur";

/// Reconciliation errors
///
/// Only malformed record-table data fails a row; source gaps are diagnostics.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Loan reconciler bound to one set of sources
pub struct Reconciler<'a> {
    channel_identifier: &'a str,
    loans: &'a (dyn LoanDataSource + Sync),
    documents: &'a (dyn DocumentSource + Sync),
    counties: CountyResolver<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        channel_identifier: &'a str,
        loans: &'a (dyn LoanDataSource + Sync),
        documents: &'a (dyn DocumentSource + Sync),
        geocoder: &'a (dyn Geocoder + Sync),
    ) -> Self {
        Self {
            channel_identifier,
            loans,
            documents,
            counties: CountyResolver::new(geocoder),
        }
    }

    /// Build the canonical row for one record
    pub async fn reconcile(
        &self,
        record: &RawRecord,
        diagnostics: &mut Diagnostics,
    ) -> Result<CanonicalRow, ReconcileError> {
        let loan_number = record.loan_number();
        info!(loan = %loan_number, "Processing loan");

        let mut row = self.seed_row(record, &loan_number)?;

        let profile = match self.loans.fetch_loan(&loan_number).await {
            Ok(profile) => Some(profile).filter(|p| !p.is_empty()),
            Err(e) => {
                record_source_error(diagnostics, &loan_number, TAG_VESTA, &e);
                None
            }
        };
        match profile {
            Some(profile) => self.apply_profile(&mut row, &profile, diagnostics).await,
            None => diagnostics.warning(&loan_number, "Property Data", "No Vesta data available"),
        }

        let document = match self.documents.find_document(&loan_number).await {
            Ok(document) => Some(document).filter(|d| !d.is_empty()),
            Err(e) => {
                record_source_error(diagnostics, &loan_number, TAG_PARSEUR, &e);
                None
            }
        };
        match document {
            Some(document) => apply_document(&mut row, &document),
            None => diagnostics.warning(
                &loan_number,
                "Settlement Agent",
                "No Parseur data available",
            ),
        }

        Ok(row)
    }

    /// Record-table fields
    fn seed_row(&self, record: &RawRecord, loan_number: &str) -> Result<CanonicalRow, ReconcileError> {
        let mut row = CanonicalRow::new(self.channel_identifier, loan_number);

        let seeded = [
            (Field::LoanAmount, fields::LOAN_SIZE),
            (Field::BorrowerName, fields::NAME),
            (Field::TriggerDate, fields::FUNDING_DATE),
            (Field::InvestorName, fields::INVESTOR),
        ];
        for (field, source_field) in seeded {
            if let Some(value) = record.scalar(source_field)? {
                row.set(field, value);
            }
        }

        Ok(row)
    }

    /// Property fields, with the county derived by geocoding
    async fn apply_profile(
        &self,
        row: &mut CanonicalRow,
        profile: &LoanProfile,
        diagnostics: &mut Diagnostics,
    ) {
        let loan_number = row.loan_number().to_string();
        let address = profile.address();

        row.set_text(Field::PropertyAddressLine1, address.line.as_deref());
        row.set_text(Field::PropertyState, address.state.as_deref());
        row.set_text(Field::PropertyZipCode, address.zip_code.as_deref());

        if address.zip_code.is_some() || address.city.is_some() {
            match self.counties.resolve(&address).await {
                Some(county) => row.set_text(Field::PropertyCounty, Some(county.as_str())),
                None => diagnostics.warning(
                    &loan_number,
                    "Property County",
                    "Could not derive from geocoding",
                ),
            }
        } else {
            diagnostics.warning(
                &loan_number,
                "Property County",
                "Insufficient address data for geocoding",
            );
        }

        if address.line.is_none() {
            diagnostics.warning(&loan_number, "Property Address", "Not found in Vesta response");
        }
    }
}

/// Settlement-agent fields
fn apply_document(row: &mut CanonicalRow, document: &ParsedDocument) {
    row.set_text(Field::OrganizationName, document.settlement_agent.as_deref());
    row.set_text(Field::OrganizationPhone, document.settlement_phone.as_deref());
    row.set_text(Field::OrganizationEmail, document.settlement_agent_email.as_deref());
}

fn record_source_error(diagnostics: &mut Diagnostics, loan_number: &str, tag: &str, e: &SourceError) {
    diagnostics.record(e.severity(), loan_number, tag, e.to_string());
}
