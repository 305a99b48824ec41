//! Trimming and splicing of freshly walked series onto persisted ones

use crate::data::{Granularity, Pair, Series, SeriesPoint};
use crate::scrape::ScrapeError;
use tracing::{error, warn};

/// Drop the leading run of padding points.
pub fn trim_padding(series: Series) -> Series {
    series
        .into_iter()
        .skip_while(SeriesPoint::is_padding)
        .collect::<Vec<_>>()
        .into()
}

/// Drop the newest point if its bucket has not closed at `now`.
pub fn drop_open_bucket(series: &mut Series, granularity: Granularity, now: i64) {
    if series
        .last()
        .is_some_and(|p| p.timestamp + granularity.bucket_secs() > now)
    {
        series.pop();
    }
}

/// Trim `fresh` and splice it after `existing`.
///
/// With an existing series ending at `T`, everything in `fresh` up to and
/// including the point at `T` is discarded. If `T` is not found (the walk
/// stopped short of it), the discontinuity is logged. Either way only points
/// at or after `T + bucket` are appended, so the new head never sits closer
/// than one bucket to the stored tail. Existing points are never altered.
pub fn merge(
    pair: &Pair,
    granularity: Granularity,
    fresh: Series,
    existing: Option<&Series>,
) -> Result<Series, ScrapeError> {
    let trimmed = trim_padding(fresh);

    let merged = match existing.and_then(|e| e.last().map(|tail| (e, tail.timestamp))) {
        None => trimmed,
        Some((existing, tail)) => {
            let floor = tail + granularity.bucket_secs();
            let matched = trimmed.points().iter().any(|p| p.timestamp == tail);
            let candidates = trimmed.points().iter().filter(|p| p.timestamp > tail).count();
            let newer: Vec<SeriesPoint> = trimmed
                .into_iter()
                .filter(|p| p.timestamp >= floor)
                .collect();

            if candidates > newer.len() {
                warn!(
                    "{}: dropped {} fetched points within one bucket of stored tail {}",
                    pair,
                    candidates - newer.len(),
                    tail
                );
            }
            if !matched {
                if let Some(head) = newer.first() {
                    warn!(
                        "{}: stored tail {} not found in fetched data, appending from {} (gap of {}s)",
                        pair,
                        tail,
                        head.timestamp,
                        head.timestamp - tail
                    );
                }
            }

            let mut merged = existing.clone();
            merged.extend(newer);
            merged
        }
    };

    if let Err((previous, next)) = merged.validate() {
        error!(
            "{}: merged series is not strictly increasing ({} then {}), refusing to persist",
            pair, previous, next
        );
        return Err(ScrapeError::Consistency {
            pair: pair.to_string(),
            detail: format!("timestamp {} follows {}", next, previous),
        });
    }

    Ok(merged)
}
