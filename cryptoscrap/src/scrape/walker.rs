//! Backward pagination over the histo API

use crate::data::{Granularity, Pair, Series};
use crate::exchange::{FetchError, PageFetcher};
use crate::scrape::{CancelSignal, ScrapeError};
use chrono::Utc;
use tracing::debug;

/// Walks a pair's remote history backward in time, one page at a time.
///
/// The walk stops at the first of: a padding point at the head (the pair did
/// not exist yet), a head at or before `known_tail`, the retention window,
/// or a page that adds nothing older.
pub struct PaginationWalker<'a, F> {
    fetcher: &'a F,
    limit: u32,
}

impl<'a, F: PageFetcher> PaginationWalker<'a, F> {
    pub fn new(fetcher: &'a F, limit: u32) -> Self {
        Self { fetcher, limit }
    }

    /// Walk back from now until `known_tail` (0 = no local data).
    pub async fn walk_backward(
        &self,
        pair: &Pair,
        granularity: Granularity,
        known_tail: i64,
        cancel: &CancelSignal,
    ) -> Result<Series, ScrapeError> {
        self.walk_backward_from(pair, granularity, known_tail, Utc::now().timestamp(), cancel)
            .await
    }

    /// Same as [`walk_backward`](Self::walk_backward) with an explicit first cursor.
    pub async fn walk_backward_from(
        &self,
        pair: &Pair,
        granularity: Granularity,
        known_tail: i64,
        start: i64,
        cancel: &CancelSignal,
    ) -> Result<Series, ScrapeError> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        let mut series = match self.fetcher.fetch_page(pair, granularity, self.limit, start).await {
            Ok(page) => page,
            Err(FetchError::WindowTooOld(message)) => {
                debug!("First page already outside retention window: {}", message);
                return Ok(Series::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut pages = 1usize;

        while let Some(earliest) = series.first().copied() {
            if earliest.high <= 0.0 || earliest.timestamp <= known_tail {
                break;
            }
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            let cursor = earliest.timestamp - granularity.bucket_secs();
            debug!("[CryptoCompare] {} page {} to {}", pair, pages + 1, cursor);

            let page = match self.fetcher.fetch_page(pair, granularity, self.limit, cursor).await {
                Ok(page) => page,
                Err(FetchError::WindowTooOld(message)) => {
                    debug!("Stopping at retention window: {}", message);
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            pages += 1;

            let older: Vec<_> = page
                .into_iter()
                .filter(|p| p.timestamp < earliest.timestamp)
                .collect();
            if older.is_empty() {
                debug!("Page to {} added nothing older, history exhausted", cursor);
                break;
            }
            series.prepend(older.into());
        }

        debug!("Walked {} pages, {} points for {}", pages, series.len(), pair);
        Ok(series)
    }
}
