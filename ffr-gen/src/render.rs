//! Report rendering
//!
//! Canonical rows are written into a copy of the fixed-layout template
//! workbook; diagnostics go to a plain-text processing-notes file.

use chrono::NaiveDateTime;
use ffr_common::{CanonicalRow, CellValue, ColumnMap, Diagnostic, Diagnostics};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// First template row below the header
pub const FIRST_DATA_ROW: u32 = 2;

const RULE_WIDTH: usize = 60;

/// Rendering errors; all are fatal to the run
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("Template has no worksheet: {0}")]
    NoWorksheet(PathBuf),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write rows into the template and save the result to `output`
///
/// Row `i` lands on sheet row `FIRST_DATA_ROW + i` of the first worksheet.
/// Only fields set on a row are written; every other cell keeps whatever the
/// template holds.
pub fn render_workbook(
    rows: &[CanonicalRow],
    template: &Path,
    output: &Path,
    columns: &ColumnMap,
) -> Result<(), RenderError> {
    info!("Generating Excel file...");

    if !template.exists() {
        return Err(RenderError::TemplateNotFound(template.to_path_buf()));
    }

    let mut book = umya_spreadsheet::reader::xlsx::read(template)
        .map_err(|e| RenderError::Workbook(format!("{}: {}", template.display(), e)))?;
    let sheet = book
        .get_sheet_mut(&0)
        .ok_or_else(|| RenderError::NoWorksheet(template.to_path_buf()))?;

    for (sheet_row, row) in (FIRST_DATA_ROW..).zip(rows) {
        for (field, value) in row.iter() {
            let cell = sheet.get_cell_mut((columns.column(field), sheet_row));
            match value {
                CellValue::Text(s) => {
                    cell.set_value_string(s.as_str());
                }
                CellValue::Number(n) => {
                    cell.set_value_number(*n);
                }
                CellValue::Bool(b) => {
                    cell.set_value_bool(*b);
                }
            }
        }
    }

    umya_spreadsheet::writer::xlsx::write(&book, output)
        .map_err(|e| RenderError::Workbook(format!("{}: {}", output.display(), e)))?;

    info!("Excel file saved to: {}", output.display());
    Ok(())
}

/// Processing-notes text
pub fn format_notes(diagnostics: &Diagnostics, generated_at: NaiveDateTime) -> String {
    let mut out = String::new();
    out.push_str("PROCESSING NOTES\n");
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push_str("\n\n");

    let _ = write!(out, "Generated: {}\n\n", generated_at.format("%Y-%m-%d %H:%M:%S"));

    write_section(&mut out, "ERRORS", diagnostics.errors(), "No errors encountered.");
    write_section(&mut out, "WARNINGS", diagnostics.warnings(), "No warnings.");

    out
}

fn write_section(out: &mut String, title: &str, entries: &[Diagnostic], empty: &str) {
    if entries.is_empty() {
        let _ = write!(out, "{}\n\n", empty);
        return;
    }

    let _ = writeln!(out, "{} ({}):", title, entries.len());
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    for entry in entries {
        let _ = writeln!(out, "  {}", entry);
    }
    out.push('\n');
}

/// Write the processing-notes file
pub fn write_notes(
    diagnostics: &Diagnostics,
    generated_at: NaiveDateTime,
    output: &Path,
) -> Result<(), RenderError> {
    std::fs::write(output, format_notes(diagnostics, generated_at))?;
    info!("Processing notes saved to: {}", output.display());
    Ok(())
}
