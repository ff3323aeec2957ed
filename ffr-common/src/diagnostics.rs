//! Run-scoped error and warning log
//!
//! Append-only for the duration of one batch run. Every entry is echoed to
//! the console as it is recorded and flushed to the processing-notes file at
//! the end of the run.

use std::fmt;
use tracing::{error, warn};

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected absence of data (not found, missing fields, geocoding inconclusive)
    Warning,
    /// A source was reachable but failed, or a record could not be processed
    Error,
}

/// One diagnostic entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub loan_number: String,
    pub field: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loan {} - {}: {}", self.loan_number, self.field, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, loan_number: &str, field: &str, message: impl Into<String>) {
        self.record(Severity::Error, loan_number, field, message);
    }

    pub fn warning(&mut self, loan_number: &str, field: &str, message: impl Into<String>) {
        self.record(Severity::Warning, loan_number, field, message);
    }

    pub fn record(
        &mut self,
        severity: Severity,
        loan_number: &str,
        field: &str,
        message: impl Into<String>,
    ) {
        let entry = Diagnostic {
            loan_number: loan_number.to_string(),
            field: field.to_string(),
            message: message.into(),
        };

        match severity {
            Severity::Error => {
                error!(loan = %entry.loan_number, field = %entry.field, "{}", entry.message);
                self.errors.push(entry);
            }
            Severity::Warning => {
                warn!(loan = %entry.loan_number, field = %entry.field, "{}", entry.message);
                self.warnings.push(entry);
            }
        }
    }

    /// Errors in the order they were recorded
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// Warnings in the order they were recorded
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}
