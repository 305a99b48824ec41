use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

/// Client for the two symbol catalogs the pair universe is built from
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    pub ticker_url: String,
    pub coinlist_url: String,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct CoinList {
    #[serde(rename = "Data", default)]
    data: HashMap<String, serde_json::Value>,
}

impl CatalogClient {
    pub fn new(ticker_url: String, coinlist_url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            ticker_url,
            coinlist_url,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.ticker_url.clone(),
            config.coinlist_url.clone(),
            config.http_timeout(),
        )
    }

    /// Market-cap ranked symbols, highest first
    pub async fn ranked_symbols(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(&self.ticker_url)
            .send()
            .await
            .context("ticker request failed")?
            .error_for_status()?;

        let entries: Vec<TickerEntry> = response.json().await.context("malformed ticker")?;
        debug!("Ticker returned {} symbols", entries.len());
        Ok(entries.into_iter().map(|e| e.symbol).collect())
    }

    /// Every symbol the histo API knows about
    pub async fn known_symbols(&self) -> Result<HashSet<String>> {
        let response = self
            .http
            .get(&self.coinlist_url)
            .send()
            .await
            .context("coin list request failed")?
            .error_for_status()?;

        let list: CoinList = response.json().await.context("malformed coin list")?;
        debug!("Coin list returned {} symbols", list.data.len());
        Ok(list.data.into_keys().collect())
    }
}
