//! # FFR Common Library
//!
//! Shared code for the funded-file reconciler:
//! - Error and result types
//! - Configuration loading and credential resolution
//! - Loan data model (record-table rows, loan profiles, parsed documents, canonical rows)
//! - Run-scoped diagnostics

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod model;

pub use config::Config;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, Result};
pub use model::{CanonicalRow, CellValue, ColumnMap, Field, RawRecord};
