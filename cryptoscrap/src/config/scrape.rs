//! Scrape configuration

use crate::exchange::HISTO_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-run scrape knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Root of the `day/`, `hour/`, `minute/` tree and the ignore list
    pub data_root: PathBuf,
    /// Points requested per page (capped at 2000 by the API)
    pub limit: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("/data"),
            limit: HISTO_LIMIT,
        }
    }
}
