//! CryptoCompare histo API client

use crate::data::{Granularity, Pair, Series, SeriesPoint};
use crate::Result;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Largest page the histo endpoints accept
pub const HISTO_LIMIT: u32 = 2000;

pub const DEFAULT_API_URL: &str = "https://min-api.cryptocompare.com";

const NO_DATA_MESSAGE: &str = "there is no data for the symbol";
const WINDOW_MESSAGE: &str = "only available for the last 7 days";

/// Outcome classes of a failed page request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The pair has no history at all. Permanent.
    #[error("no data for symbol: {0}")]
    NoDataForSymbol(String),

    /// The granularity's retention window was exceeded. Ends a walk normally.
    #[error("retention window exceeded: {0}")]
    WindowTooOld(String),

    /// Anything else: network, HTTP status, malformed body, unknown API error.
    #[error("transient fetch failure: {0}")]
    Transient(String),
}

impl FetchError {
    /// Classify an error message reported by the API.
    pub fn from_api_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains(NO_DATA_MESSAGE) {
            Self::NoDataForSymbol(message.to_string())
        } else if lower.contains(WINDOW_MESSAGE) {
            Self::WindowTooOld(message.to_string())
        } else {
            Self::Transient(message.to_string())
        }
    }
}

/// Source of bounded candle pages.
pub trait PageFetcher {
    /// Fetch at most `limit + 1` points with timestamps `<= to_timestamp`,
    /// oldest first.
    fn fetch_page(
        &self,
        pair: &Pair,
        granularity: Granularity,
        limit: u32,
        to_timestamp: i64,
    ) -> impl Future<Output = std::result::Result<Series, FetchError>> + Send;
}

#[derive(Debug, Deserialize)]
struct HistoResponse {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct HistoPoint {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volumefrom: f64,
    volumeto: f64,
}

impl From<HistoPoint> for SeriesPoint {
    fn from(raw: HistoPoint) -> Self {
        SeriesPoint::new(
            raw.time,
            raw.open,
            raw.high,
            raw.low,
            raw.close,
            raw.volumefrom,
            raw.volumeto,
        )
    }
}

/// Decode a histo response body into a page.
fn parse_histo_body(body: &str) -> std::result::Result<Series, FetchError> {
    let response: HistoResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Transient(format!("malformed response: {}", e)))?;

    match response.response.as_str() {
        "Success" => {
            let raw: Vec<HistoPoint> = serde_json::from_value(response.data)
                .map_err(|e| FetchError::Transient(format!("malformed data: {}", e)))?;
            let mut series: Series = raw.into_iter().map(SeriesPoint::from).collect::<Vec<_>>().into();
            series.normalize();
            Ok(series)
        }
        "Error" => Err(FetchError::from_api_message(&response.message)),
        other => Err(FetchError::Transient(format!(
            "unexpected response '{}': {}",
            other, response.message
        ))),
    }
}

/// HTTP client for the histo endpoints
#[derive(Debug, Clone)]
pub struct CryptoCompareClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CryptoCompareClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Client without API key and a 30s timeout, pointed at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::new(base_url, None, Duration::from_secs(30))
    }
}

impl PageFetcher for CryptoCompareClient {
    async fn fetch_page(
        &self,
        pair: &Pair,
        granularity: Granularity,
        limit: u32,
        to_timestamp: i64,
    ) -> std::result::Result<Series, FetchError> {
        let url = format!("{}/data/{}", self.base_url, granularity.endpoint());
        debug!("[CryptoCompare] {} {} to {}", granularity.endpoint(), pair, to_timestamp);

        let mut request = self.http.get(&url).query(&[
            ("fsym", pair.from.clone()),
            ("tsym", pair.to.clone()),
            ("limit", limit.min(HISTO_LIMIT).to_string()),
            ("toTs", to_timestamp.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("authorization", format!("Apikey {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("request failed: {}", e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("failed to read body: {}", e)))?;

        match parse_histo_body(&body) {
            Err(FetchError::Transient(_)) if !status.is_success() => {
                Err(FetchError::Transient(format!("HTTP {}", status)))
            }
            result => result,
        }
    }
}
