//! Airtable record-table client
//!
//! Lists every record of one view, following the `offset` cursor until the
//! API stops returning one. Pages are throttled with a fixed delay.

use super::{api_error, http_client, RecordTable, SourceError};
use async_trait::async_trait;
use ffr_common::config::RecordTableConfig;
use ffr_common::RawRecord;
use reqwest::Url;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// One page of a list-records response
#[derive(Debug, Default, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<RawRecord>,
    /// Cursor for the next page; absent on the last page
    #[serde(default)]
    pub offset: Option<String>,
}

pub struct AirtableClient {
    http_client: reqwest::Client,
    url: Url,
    token: String,
    view: String,
    page_delay: Duration,
}

impl AirtableClient {
    pub fn new(config: &RecordTableConfig) -> Result<Self, SourceError> {
        let mut url = Url::parse(&config.base_url)
            .map_err(|e| SourceError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(config.base_url.clone()))?
            .pop_if_empty()
            .push(&config.base_id)
            .push(&config.table);

        Ok(Self {
            http_client: http_client()?,
            url,
            token: config.token.clone(),
            view: config.view.clone(),
            page_delay: config.page_delay,
        })
    }

    async fn fetch_page(&self, offset: Option<String>) -> Result<RecordPage, SourceError> {
        let mut query = vec![("view", self.view.clone())];
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }

        debug!(url = %self.url, "Querying Airtable");

        let response = self
            .http_client
            .get(self.url.clone())
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RecordTable for AirtableClient {
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, SourceError> {
        info!("Fetching records from Airtable view: {}", self.view);

        let client = self;
        let records =
            collect_pages(move |offset| client.fetch_page(offset), self.page_delay).await?;

        info!("Found {} records in Airtable", records.len());
        Ok(records)
    }
}

/// Drain a cursor-paginated listing
///
/// Sleeps `delay` between pages (not after the last one). Stops on the first
/// page without a cursor; any page error aborts the whole listing.
pub async fn collect_pages<F, Fut>(
    mut fetch_page: F,
    delay: Duration,
) -> Result<Vec<RawRecord>, SourceError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<RecordPage, SourceError>>,
{
    let mut records = Vec::new();
    let mut offset = None;

    loop {
        let page = fetch_page(offset.take()).await?;
        records.extend(page.records);

        match page.offset {
            Some(next) if !next.is_empty() => offset = Some(next),
            _ => break,
        }

        tokio::time::sleep(delay).await;
    }

    Ok(records)
}
