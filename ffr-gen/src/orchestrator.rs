//! Batch orchestration
//!
//! Fetches every record, reconciles them one at a time in fetch order, then
//! renders the workbook and processing notes. A record that fails to
//! reconcile is logged as an error and skipped; only the record-table fetch
//! and the output writes can abort a run.

use crate::geocode::{Geocoder, NominatimGeocoder};
use crate::reconcile::Reconciler;
use crate::render::{render_workbook, write_notes};
use crate::sources::{
    AirtableClient, DocumentSource, LoanDataSource, ParseurClient, RecordTable, VestaClient,
};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use ffr_common::{CanonicalRow, Config, Diagnostics, RawRecord};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Source and geocoder implementations for one run
pub struct Sources<'a> {
    pub records: &'a (dyn RecordTable + Sync),
    pub loans: &'a (dyn LoanDataSource + Sync),
    pub documents: &'a (dyn DocumentSource + Sync),
    pub geocoder: &'a (dyn Geocoder + Sync),
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub loans: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Written workbook; `None` when the view was empty
    pub workbook: Option<PathBuf>,
    pub notes: Option<PathBuf>,
}

/// Console summary printed at the end of a run
impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "Processing complete!")?;
        writeln!(f, "Processed {} loans", self.loans)?;
        writeln!(f, "Errors: {}", self.errors)?;
        writeln!(f, "Warnings: {}", self.warnings)?;
        write!(f, "{}", rule)
    }
}

/// Reconcile records in order, isolating per-record failures
///
/// Returns one row per successfully reconciled record, in input order.
pub async fn process_records(
    records: &[RawRecord],
    reconciler: &Reconciler<'_>,
    diagnostics: &mut Diagnostics,
) -> Vec<CanonicalRow> {
    let mut rows = Vec::with_capacity(records.len());

    for record in records {
        match reconciler.reconcile(record, diagnostics).await {
            Ok(row) => rows.push(row),
            Err(e) => diagnostics.error(&record.loan_number(), "Processing", e.to_string()),
        }
    }

    rows
}

/// Run against the live services named in `config`
pub async fn run(config: &Config) -> Result<RunSummary> {
    let records = AirtableClient::new(&config.record_table)
        .context("Failed to create Airtable client")?;
    let loans = VestaClient::new(&config.loan_data).context("Failed to create Vesta client")?;
    let documents =
        ParseurClient::new(&config.documents).context("Failed to create Parseur client")?;
    let geocoder =
        NominatimGeocoder::new(&config.geocoder).context("Failed to create geocoder")?;

    let sources = Sources {
        records: &records,
        loans: &loans,
        documents: &documents,
        geocoder: &geocoder,
    };

    run_with(config, &sources, Local::now().naive_local()).await
}

/// Run the full pipeline over the given sources
///
/// `started` stamps the output file names and the notes header.
pub async fn run_with(
    config: &Config,
    sources: &Sources<'_>,
    started: NaiveDateTime,
) -> Result<RunSummary> {
    info!("Starting funded file generation");
    info!("Timestamp: {}", started.format("%Y-%m-%d %H:%M:%S"));

    if !config.output.template.exists() {
        anyhow::bail!("Template not found: {}", config.output.template.display());
    }

    let records = sources
        .records
        .fetch_all()
        .await
        .context("Airtable API error")?;

    let mut diagnostics = Diagnostics::new();

    if records.is_empty() {
        info!("No records found in Airtable view");
        return Ok(RunSummary {
            loans: 0,
            errors: 0,
            warnings: 0,
            workbook: None,
            notes: None,
        });
    }

    let reconciler = Reconciler::new(
        &config.channel_identifier,
        sources.loans,
        sources.documents,
        sources.geocoder,
    );
    let rows = process_records(&records, &reconciler, &mut diagnostics).await;

    let stamp = started.format("%Y%m%d_%H%M%S");
    let workbook = config
        .output
        .directory
        .join(format!("Funded_File_{}.xlsx", stamp));
    let notes = config
        .output
        .directory
        .join(format!("processing_notes_{}.txt", stamp));

    render_workbook(&rows, &config.output.template, &workbook, &config.columns)
        .context("Failed to write workbook")?;
    write_notes(&diagnostics, started, &notes).context("Failed to write processing notes")?;

    Ok(RunSummary {
        loans: rows.len(),
        errors: diagnostics.errors().len(),
        warnings: diagnostics.warnings().len(),
        workbook: Some(workbook),
        notes: Some(notes),
    })
}
