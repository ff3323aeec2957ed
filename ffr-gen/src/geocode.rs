//! County lookup by geocoding
//!
//! The loan source carries no county, so it is derived from the property
//! address. Queries run from least to most specific and stop at the first
//! county found: noisy street or city spellings make the specific queries
//! less reliable than the zip code alone.

use async_trait::async_trait;
use ffr_common::config::GeocoderConfig;
use ffr_common::model::PropertyAddress;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const COUNTY_SUFFIX: &str = " County";

/// Geocoder errors
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocoder timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Geocoder service error {0}: {1}")]
    Service(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GeocodeError::Timeout
        } else if e.is_decode() {
            GeocodeError::Parse(e.to_string())
        } else {
            GeocodeError::Network(e.to_string())
        }
    }
}

/// Free-text geocoding restricted to the United States
#[async_trait]
pub trait Geocoder {
    /// Raw county component of the best match, if the match carries one
    async fn county(&self, query: &str) -> Result<Option<String>, GeocodeError>;
}

/// Nominatim (OpenStreetMap) search client
pub struct NominatimGeocoder {
    http_client: reqwest::Client,
    search_url: String,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    address: Option<AddressDetails>,
}

#[derive(Debug, Deserialize)]
struct AddressDetails {
    #[serde(default)]
    county: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        // Public instance usage policy: at most 1 request/second
        let quota = Quota::per_second(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            search_url: format!("{}/search", config.base_url.trim_end_matches('/')),
            rate_limiter: RateLimiter::direct(quota),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn county(&self, query: &str) -> Result<Option<String>, GeocodeError> {
        self.rate_limiter.until_ready().await;

        debug!(query = %query, "Querying Nominatim");

        let response = self
            .http_client
            .get(&self.search_url)
            .query(&[
                ("q", query),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("countrycodes", "us"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Service(status.as_u16(), body));
        }

        let results: Vec<SearchResult> = response.json().await?;
        Ok(results
            .into_iter()
            .next()
            .and_then(|r| r.address)
            .and_then(|a| a.county))
    }
}

/// Strip a trailing " County" and surrounding whitespace
///
/// Returns `None` when nothing is left.
pub fn normalize_county(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let name = trimmed.strip_suffix(COUNTY_SUFFIX).unwrap_or(trimmed).trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Geocoding queries to try, most reliable first
///
/// 1. zip code alone
/// 2. city, state and zip
/// 3. full street address
///
/// A tier is skipped when any of its components is missing.
pub fn county_queries(address: &PropertyAddress) -> Vec<String> {
    let mut queries = Vec::with_capacity(3);

    if let Some(zip) = &address.zip_code {
        queries.push(format!("{}, USA", zip));
    }

    if let (Some(city), Some(state), Some(zip)) = (&address.city, &address.state, &address.zip_code)
    {
        queries.push(format!("{}, {} {}, USA", city, state, zip));

        if let Some(line) = &address.line {
            queries.push(format!("{}, {}, {} {}, USA", line, city, state, zip));
        }
    }

    queries
}

/// Fallback chain over a [`Geocoder`]
pub struct CountyResolver<'a> {
    geocoder: &'a (dyn Geocoder + Sync),
}

impl<'a> CountyResolver<'a> {
    pub fn new(geocoder: &'a (dyn Geocoder + Sync)) -> Self {
        Self { geocoder }
    }

    /// County for an address, from the first tier that yields one
    ///
    /// Failed queries are logged to the console and the next tier is tried.
    pub async fn resolve(&self, address: &PropertyAddress) -> Option<String> {
        for query in county_queries(address) {
            match self.geocoder.county(&query).await {
                Ok(Some(raw)) => {
                    if let Some(county) = normalize_county(&raw) {
                        debug!(query = %query, county = %county, "County resolved");
                        return Some(county);
                    }
                }
                Ok(None) => debug!(query = %query, "No county in geocoding result"),
                Err(e) => warn!(query = %query, "Geocoding error: {}", e),
            }
        }
        None
    }
}
