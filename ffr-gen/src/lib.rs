//! ffr-gen library interface
//!
//! Reconciles post-close loan records from Airtable, Vesta and Parseur into
//! the funded-file template workbook. Exposed as a library for integration
//! testing with fixture sources.

pub mod geocode;
pub mod orchestrator;
pub mod reconcile;
pub mod render;
pub mod sources;

pub use orchestrator::{process_records, run, run_with, RunSummary, Sources};
pub use reconcile::{ReconcileError, Reconciler};
