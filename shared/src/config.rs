use anyhow::Context;
use cryptoscrap::config::ScrapeConfig;
use cryptoscrap::data::Granularity;
use cryptoscrap::exchange::{
    ConnectivityGate, CryptoCompareClient, DEFAULT_API_URL, DEFAULT_PROBE_HOST, HISTO_LIMIT,
};
use dotenv::dotenv;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_COINLIST_URL: &str = "https://min-api.cryptocompare.com/data/all/coinlist";
pub const DEFAULT_TICKER_URL: &str = "https://api.coinmarketcap.com/v1/ticker/?limit=0";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_root: PathBuf,
    /// Seconds to wait before the first pass
    pub delay_start: u64,
    /// Seconds between the passes of two quote currencies
    pub delay_between_scrap: u64,
    /// Seconds between two refresh rounds
    pub refresh_rate: u64,
    pub granularity: Granularity,
    pub to_currencies: Vec<String>,
    pub histo_limit: u32,
    pub api_base_url: String,
    pub coinlist_url: String,
    pub ticker_url: String,
    pub api_key: Option<String>,
    pub connectivity_host: String,
    pub connectivity_retry_secs: u64,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| -> Result<u64, anyhow::Error> {
            match lookup(key) {
                Some(value) => value
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, value)),
                None => Ok(default),
            }
        };

        let granularity = var("GRANULARITY", "minute")
            .parse::<Granularity>()
            .map_err(anyhow::Error::msg)?;

        let to_currencies: Vec<String> = var("TO_CURRENCIES", "USD,BTC")
            .split(',')
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        if to_currencies.is_empty() {
            anyhow::bail!("TO_CURRENCIES must name at least one currency");
        }

        // values above the API maximum are capped, not rejected
        let histo_limit = number("HISTO_LIMIT", u64::from(HISTO_LIMIT))?
            .clamp(1, u64::from(HISTO_LIMIT)) as u32;

        Ok(Config {
            data_root: PathBuf::from(var("PATH_DATA", "/data")),
            delay_start: number("DELAY_START", 5 * 60)?,
            delay_between_scrap: number("DELAY_BETWEEN_SCRAP", 3600)?,
            refresh_rate: number("REFRESH_RATE", 24 * 3600)?,
            granularity,
            to_currencies,
            histo_limit,
            api_base_url: var("CRYPTOCOMPARE_API_URL", DEFAULT_API_URL),
            coinlist_url: var("CRYPTOCOMPARE_COINLIST_URL", DEFAULT_COINLIST_URL),
            ticker_url: var("COINMARKETCAP_TICKER_URL", DEFAULT_TICKER_URL),
            api_key: lookup("CRYPTOCOMPARE_API_KEY").filter(|k| !k.trim().is_empty()),
            connectivity_host: var("CONNECTIVITY_HOST", DEFAULT_PROBE_HOST),
            connectivity_retry_secs: number("CONNECTIVITY_RETRY_SECS", 30)?,
            http_timeout_secs: number("HTTP_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn scrape_config(&self) -> ScrapeConfig {
        ScrapeConfig {
            data_root: self.data_root.clone(),
            limit: self.histo_limit,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn histo_client(&self) -> Result<CryptoCompareClient, anyhow::Error> {
        CryptoCompareClient::new(&self.api_base_url, self.api_key.clone(), self.http_timeout())
    }

    pub fn connectivity_gate(&self) -> ConnectivityGate {
        ConnectivityGate::new(
            &self.connectivity_host,
            Duration::from_secs(self.connectivity_retry_secs),
        )
    }
}
