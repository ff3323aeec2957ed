//! Read-only source clients
//!
//! Each source is a narrow trait with a single lookup so the reconciler can be
//! driven by fixtures in tests:
//! - [`RecordTable`]: all records of a view (Airtable)
//! - [`LoanDataSource`]: loan profile by loan number (Vesta)
//! - [`DocumentSource`]: parsed settlement document by loan number (Parseur)

use async_trait::async_trait;
use ffr_common::model::{LoanProfile, ParsedDocument};
use ffr_common::{RawRecord, Severity};
use std::time::Duration;
use thiserror::Error;

pub mod airtable;
pub mod parseur;
pub mod vesta;

#[cfg(test)]
pub(crate) mod test_server;

pub use airtable::AirtableClient;
pub use parseur::ParseurClient;
pub use vesta::VestaClient;

const USER_AGENT: &str = concat!("ffr/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Source client errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    NotFound(String),

    #[error("Mailbox \"{0}\" not found")]
    MailboxNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl SourceError {
    /// Not-found is an expected gap; everything else is an upstream failure
    pub fn severity(&self) -> Severity {
        match self {
            SourceError::NotFound(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Parse(e.to_string())
        } else {
            SourceError::Network(e.to_string())
        }
    }
}

/// Record-keeping table
#[async_trait]
pub trait RecordTable {
    /// Fetch every record of the configured view, in view order
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, SourceError>;
}

/// Loan-servicing source
#[async_trait]
pub trait LoanDataSource {
    async fn fetch_loan(&self, loan_number: &str) -> Result<LoanProfile, SourceError>;
}

/// Document-parsing source
#[async_trait]
pub trait DocumentSource {
    async fn find_document(&self, loan_number: &str) -> Result<ParsedDocument, SourceError>;
}

/// Shared HTTP client settings for all sources
pub(crate) fn http_client() -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| SourceError::Network(e.to_string()))
}

/// Map a non-success response to [`SourceError::Api`]
pub(crate) async fn api_error(response: reqwest::Response) -> SourceError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    SourceError::Api { status, body }
}
