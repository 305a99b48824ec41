//! Cryptoscrap: incremental CryptoCompare candle history scraper
//!
//! Keeps one CSV file per trading pair and granularity current by walking
//! the histo API backward from now until it meets the locally stored tail,
//! then splicing the new candles onto the file.
//!
//! # Features
//!
//! - **Data Management**: candle series, CSV pair store, ignore list
//! - **Exchange Integration**: CryptoCompare histo client, reachability gate
//! - **Scrape Engine**: pagination walker, merger, per-pass orchestrator
//!
//! # Example
//!
//! ```no_run
//! use cryptoscrap::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = CryptoCompareClient::with_base_url(DEFAULT_API_URL)?;
//!     let config = ScrapeConfig::default();
//!     let orchestrator = ScrapeOrchestrator::from_config(client, &config);
//!     let universe = vec!["ETH".to_string(), "LTC".to_string()];
//!     let report = orchestrator
//!         .run(&universe, "BTC", Granularity::Hour, &CancelSignal::never())
//!         .await;
//!     println!("{} pairs updated", report.succeeded.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod exchange;
pub mod scrape;

// Re-export commonly used types
pub mod prelude {
    pub use crate::config::*;
    pub use crate::data::*;
    pub use crate::exchange::*;
    pub use crate::scrape::*;

    pub use anyhow::{Context, Result};
}

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
