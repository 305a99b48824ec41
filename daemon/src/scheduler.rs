//! Start delay, catch-up passes and the periodic refresh loop

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cryptoscrap::data::{Granularity, PairStore};
use cryptoscrap::scrape::{resolve_universe, sleep_or_cancel, CancelSignal, ScrapeError, ScrapeReport};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::state::AppState;

/// Stored data older than this triggers a catch-up pass at startup
const CATCH_UP_AGE_HOURS: i64 = 24;

pub struct Scheduler {
    state: Arc<AppState>,
    cancel: CancelSignal,
}

impl Scheduler {
    pub fn new(state: Arc<AppState>, cancel: CancelSignal) -> Self {
        Self { state, cancel }
    }

    /// Run until cancelled.
    pub async fn run(&self) -> Result<()> {
        let config = &self.state.config;

        info!("Waiting {}s before the first scraping session...", config.delay_start);
        if !self.sleep(config.delay_start).await {
            return Ok(());
        }

        let mut currencies = shuffled(&config.to_currencies);
        let store = self.state.orchestrator.store();
        let mut first = true;
        for currency in &currencies {
            if !needs_update(store, config.granularity, currency, Utc::now())? {
                info!("{} market is up to date", currency);
                continue;
            }
            if !first && !self.sleep(config.delay_between_scrap).await {
                return Ok(());
            }
            first = false;

            info!("New data available for {} market", currency);
            self.run_pass(currency).await;
            if self.cancel.is_cancelled() {
                return Ok(());
            }
        }

        loop {
            info!(
                "Waiting for next scraping session (every {} hour)...",
                config.refresh_rate / 3600
            );
            if !self.sleep(config.refresh_rate).await {
                return Ok(());
            }

            currencies = shuffled(&config.to_currencies);
            for (idx, currency) in currencies.iter().enumerate() {
                if idx > 0 && !self.sleep(config.delay_between_scrap).await {
                    return Ok(());
                }
                self.run_pass(currency).await;
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
            }
        }
    }

    /// One pass for `to_currency`. Failures are logged, never propagated.
    pub async fn run_pass(&self, to_currency: &str) -> Option<ScrapeReport> {
        match self.try_pass(to_currency).await {
            Ok(report) => Some(report),
            Err(e) => {
                if matches!(e.downcast_ref::<ScrapeError>(), Some(ScrapeError::Cancelled)) {
                    warn!("{} pass cancelled", to_currency);
                } else {
                    error!("{} pass aborted: {:#}", to_currency, e);
                }
                None
            }
        }
    }

    async fn try_pass(&self, to_currency: &str) -> Result<ScrapeReport> {
        let state = &self.state;
        let store = state.orchestrator.store();
        store
            .ensure_layout()
            .with_context(|| format!("cannot create data layout under {}", store.root().display()))?;

        state.gate.wait_until_reachable(&self.cancel).await?;

        let ranked = state.catalog.ranked_symbols().await?;
        let known = state.catalog.known_symbols().await?;
        let ignored = state
            .orchestrator
            .ignore_list()
            .load_all()
            .context("cannot read ignore list")?;
        let universe = resolve_universe(&ranked, &known, &ignored);

        let report = state
            .orchestrator
            .run(&universe, to_currency, state.config.granularity, &self.cancel)
            .await;
        Ok(report)
    }

    async fn sleep(&self, secs: u64) -> bool {
        let completed = sleep_or_cancel(Duration::from_secs(secs), &self.cancel).await;
        if !completed {
            info!("Shutdown requested, stopping scheduler");
        }
        completed
    }
}

fn shuffled(currencies: &[String]) -> Vec<String> {
    let mut currencies = currencies.to_vec();
    currencies.shuffle(&mut rand::thread_rng());
    currencies
}

/// True if no file quoted in `to_currency` exists or the newest is stale.
pub fn needs_update(
    store: &PairStore,
    granularity: Granularity,
    to_currency: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let last = store
        .last_refreshed(granularity, to_currency)
        .context("cannot inspect stored series")?;
    Ok(match last {
        None => true,
        Some(refreshed) => now - refreshed > ChronoDuration::hours(CATCH_UP_AGE_HOURS),
    })
}
