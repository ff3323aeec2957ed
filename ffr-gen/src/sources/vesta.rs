//! Vesta loan-servicing client
//!
//! Single lookup by loan number. The subject-property address is the only
//! part of the payload the reconciler reads.

use super::{api_error, http_client, LoanDataSource, SourceError};
use async_trait::async_trait;
use ffr_common::config::LoanDataConfig;
use ffr_common::model::LoanProfile;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use tracing::{debug, info};

const API_VERSION_HEADER: &str = "X-Api-Version";

pub struct VestaClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_version: String,
}

impl VestaClient {
    pub fn new(config: &LoanDataConfig) -> Result<Self, SourceError> {
        Ok(Self {
            http_client: http_client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn loan_url(&self, loan_number: &str) -> String {
        format!("{}/v1/loans/{}", self.base_url, loan_number)
    }
}

#[async_trait]
impl LoanDataSource for VestaClient {
    async fn fetch_loan(&self, loan_number: &str) -> Result<LoanProfile, SourceError> {
        let url = self.loan_url(loan_number);
        info!(loan = %loan_number, "Fetching Vesta data");
        debug!(url = %url, "Querying Vesta API");

        let mut request = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(API_VERSION_HEADER, &self.api_version);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound("Loan not found in Vesta".to_string()));
        }

        if !status.is_success() {
            return Err(api_error(response).await);
        }

        // A `null` body is an empty profile, not a decode failure
        let profile: Option<LoanProfile> = response.json().await?;
        Ok(profile.unwrap_or_default())
    }
}
