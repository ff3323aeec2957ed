//! Parseur document-parsing client
//!
//! Two-step lookup: resolve the configured mailbox to its id, then scan the
//! mailbox's documents for the loan number. The mailbox id is resolved once
//! per run.

use super::{api_error, http_client, DocumentSource, SourceError};
use async_trait::async_trait;
use ffr_common::config::DocumentConfig;
use ffr_common::model::ParsedDocument;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Listing endpoints answer with a bare array or a paged `results` object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> Listing<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Paged { results: items } => items,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Mailbox {
    pub id: Value,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parsed_data: Option<ParsedDocument>,
}

pub struct ParseurClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    mailbox_name: String,
    mailbox_id: OnceCell<String>,
}

impl ParseurClient {
    pub fn new(config: &DocumentConfig) -> Result<Self, SourceError> {
        Ok(Self {
            http_client: http_client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            mailbox_name: config.mailbox.clone(),
            mailbox_id: OnceCell::new(),
        })
    }

    async fn get_listing<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, SourceError> {
        debug!(url = %url, "Querying Parseur API");

        let mut request = self.http_client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let listing: Listing<T> = response.json().await?;
        Ok(listing.into_items())
    }

    async fn resolve_mailbox(&self) -> Result<String, SourceError> {
        let url = format!("{}/v1/mailboxes", self.base_url);
        let mailboxes: Vec<Mailbox> = self.get_listing(&url).await?;

        let id = match_mailbox(&mailboxes, &self.mailbox_name)
            .ok_or_else(|| SourceError::MailboxNotFound(self.mailbox_name.clone()))?;
        info!(mailbox = %self.mailbox_name, id = %id, "Resolved Parseur mailbox");
        Ok(id)
    }
}

#[async_trait]
impl DocumentSource for ParseurClient {
    async fn find_document(&self, loan_number: &str) -> Result<ParsedDocument, SourceError> {
        let mailbox_id = self
            .mailbox_id
            .get_or_try_init(|| self.resolve_mailbox())
            .await?;

        let url = format!("{}/v1/mailboxes/{}/documents", self.base_url, mailbox_id);
        let documents: Vec<Document> = self.get_listing(&url).await?;

        let document = match_document(&documents, loan_number)
            .ok_or_else(|| SourceError::NotFound("No matching document found".to_string()))?;
        info!(loan = %loan_number, document = %document.name, "Found Parseur document");

        Ok(document.parsed_data.clone().unwrap_or_default())
    }
}

/// Id of the first mailbox whose normalized name contains `wanted`
///
/// Names are compared case-insensitively with spaces read as hyphens.
pub fn match_mailbox(mailboxes: &[Mailbox], wanted: &str) -> Option<String> {
    let wanted = wanted.to_lowercase();
    mailboxes
        .iter()
        .find(|m| m.name.to_lowercase().replace(' ', "-").contains(&wanted))
        .and_then(|m| match &m.id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// First document whose name contains the loan number or whose parsed
/// `document_name` equals it
///
/// Plain substring matching: "L10" also matches a document named "L100".
pub fn match_document<'a>(documents: &'a [Document], loan_number: &str) -> Option<&'a Document> {
    documents.iter().find(|doc| {
        doc.name.contains(loan_number)
            || doc
                .parsed_data
                .as_ref()
                .and_then(|p| p.document_name.as_deref())
                == Some(loan_number)
    })
}
