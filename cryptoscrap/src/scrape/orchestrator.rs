//! Per-pass scrape loop: walk, merge and persist every pair of a universe

use crate::config::ScrapeConfig;
use crate::data::{Granularity, IgnoreListStore, Pair, PairStore, Series};
use crate::exchange::{ConnectivityGate, PageFetcher, HISTO_LIMIT};
use crate::scrape::{drop_open_bucket, merge, CancelSignal, FailureKind, PaginationWalker, ScrapeError};
use chrono::Utc;
use tracing::{error, info, info_span, warn, Instrument};

/// Result of one successfully processed pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// File rewritten with `added` new points
    Updated { added: usize, total: usize },
    /// Nothing new upstream; file left as is
    Unchanged { total: usize },
    /// Upstream returned only padding; nothing written
    Empty,
}

/// Counts of one orchestration pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    pub succeeded: Vec<String>,
    /// Symbols added to the ignore list during this pass
    pub excluded: Vec<String>,
    pub failed: Vec<(String, FailureKind)>,
    /// The pass stopped before the end of the universe
    pub cancelled: bool,
}

impl ScrapeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs the fetch → merge → persist pipeline over a universe, one pair at a time.
pub struct ScrapeOrchestrator<F> {
    fetcher: F,
    store: PairStore,
    ignore_list: IgnoreListStore,
    limit: u32,
    gate: Option<ConnectivityGate>,
}

impl<F: PageFetcher> ScrapeOrchestrator<F> {
    pub fn new(fetcher: F, store: PairStore, ignore_list: IgnoreListStore) -> Self {
        Self {
            fetcher,
            store,
            ignore_list,
            limit: HISTO_LIMIT,
            gate: None,
        }
    }

    /// Stores under `config.data_root`, page size from `config.limit`
    pub fn from_config(fetcher: F, config: &ScrapeConfig) -> Self {
        Self::new(
            fetcher,
            PairStore::new(&config.data_root),
            IgnoreListStore::in_root(&config.data_root),
        )
        .with_limit(config.limit)
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, HISTO_LIMIT);
        self
    }

    /// Wait for connectivity before every pair
    pub fn with_gate(mut self, gate: ConnectivityGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &PairStore {
        &self.store
    }

    pub fn ignore_list(&self) -> &IgnoreListStore {
        &self.ignore_list
    }

    /// Scrape every symbol of `universe` quoted in `to_currency`.
    ///
    /// A failing pair is recorded and the pass moves on. Cancellation
    /// abandons the in-flight pair without writing it and ends the pass.
    pub async fn run(
        &self,
        universe: &[String],
        to_currency: &str,
        granularity: Granularity,
        cancel: &CancelSignal,
    ) -> ScrapeReport {
        let symbols: Vec<&String> = universe.iter().filter(|s| *s != to_currency).collect();
        info!("Scraping {} data for {} coins...", granularity, symbols.len());

        let mut report = ScrapeReport::default();
        for symbol in symbols {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let pair = Pair::new(symbol.as_str(), to_currency);
            let span = info_span!("pair", pair = %pair, granularity = %granularity);
            match self.scrape_pair(&pair, granularity, cancel).instrument(span).await {
                Ok(outcome) => {
                    match outcome {
                        PairOutcome::Updated { added, total } => {
                            info!("{}: {} new points ({} total)", pair, added, total)
                        }
                        PairOutcome::Unchanged { total } => {
                            info!("{}: up to date ({} points)", pair, total)
                        }
                        PairOutcome::Empty => info!("{}: no trading data yet", pair),
                    }
                    report.succeeded.push(symbol.clone());
                }
                Err(ScrapeError::NoData(message)) => {
                    match self.ignore_list.append(symbol) {
                        Ok(()) => info!("{}: {}; added {} to ignore list", pair, message, symbol),
                        Err(e) => warn!("{}: failed to update ignore list: {}", pair, e),
                    }
                    report.excluded.push(symbol.clone());
                }
                Err(ScrapeError::Cancelled) => {
                    warn!("{}: cancelled, pair abandoned", pair);
                    report.cancelled = true;
                    break;
                }
                Err(e @ ScrapeError::ConnectivityLost { .. }) => {
                    error!("{}: {}; stopping pass", pair, e);
                    report.failed.push((symbol.clone(), FailureKind::Connectivity));
                    break;
                }
                Err(e) => {
                    error!("Failed to scrape {}: {}", pair, e);
                    let kind = e.failure_kind().unwrap_or(FailureKind::Transient);
                    report.failed.push((symbol.clone(), kind));
                }
            }
        }

        info!(
            "{} pass finished: {} succeeded, {} failed, {} newly ignored{}",
            granularity,
            report.succeeded.len(),
            report.failed.len(),
            report.excluded.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    /// Bring one pair's persisted series up to date.
    pub async fn scrape_pair(
        &self,
        pair: &Pair,
        granularity: Granularity,
        cancel: &CancelSignal,
    ) -> Result<PairOutcome, ScrapeError> {
        if let Some(gate) = &self.gate {
            gate.wait_until_reachable(cancel).await?;
        }

        info!("Scraping {} data of market {}...", granularity, pair);
        let existing = self.store.load(pair, granularity);
        let known_tail = existing
            .as_ref()
            .and_then(Series::last)
            .map_or(0, |p| p.timestamp);

        let walker = PaginationWalker::new(&self.fetcher, self.limit);
        let mut fresh = walker
            .walk_backward(pair, granularity, known_tail, cancel)
            .await?;
        drop_open_bucket(&mut fresh, granularity, Utc::now().timestamp());

        let merged = merge(pair, granularity, fresh, existing.as_ref())?;
        if merged.is_empty() {
            return Ok(PairOutcome::Empty);
        }
        if existing.as_ref() == Some(&merged) {
            return Ok(PairOutcome::Unchanged { total: merged.len() });
        }

        let previous = existing.as_ref().map_or(0, Series::len);
        self.store.save(pair, granularity, &merged)?;
        Ok(PairOutcome::Updated {
            added: merged.len().saturating_sub(previous),
            total: merged.len(),
        })
    }
}
