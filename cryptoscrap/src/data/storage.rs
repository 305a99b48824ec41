//! CSV persistence of candle series, one file per pair and granularity

use crate::data::{Granularity, Pair, Series, SeriesPoint};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Column order of every persisted series file
pub const CSV_HEADER: [&str; 7] = ["time", "open", "high", "low", "close", "volumefrom", "volumeto"];

/// Format of the `time` column (UTC)
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid time value '{0}'")]
    InvalidTime(String),

    #[error("rows out of order: {next} follows {previous}")]
    Unordered { previous: i64, next: i64 },
}

/// One CSV record. Field names double as the header.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volumefrom: f64,
    volumeto: f64,
}

impl CsvRow {
    fn from_point(point: &SeriesPoint) -> Result<Self, StoreError> {
        Ok(Self {
            time: format_timestamp(point.timestamp)?,
            open: point.open,
            high: point.high,
            low: point.low,
            close: point.close,
            volumefrom: point.volume_from,
            volumeto: point.volume_to,
        })
    }

    fn into_point(self) -> Result<SeriesPoint, StoreError> {
        Ok(SeriesPoint::new(
            parse_timestamp(&self.time)?,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volumefrom,
            self.volumeto,
        ))
    }
}

/// Render epoch seconds in [`DATE_FORMAT`]
pub fn format_timestamp(ts: i64) -> Result<String, StoreError> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .ok_or_else(|| StoreError::InvalidTime(ts.to_string()))
}

/// Parse a [`DATE_FORMAT`] string back to epoch seconds
pub fn parse_timestamp(value: &str) -> Result<i64, StoreError> {
    NaiveDateTime::parse_from_str(value.trim(), DATE_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|_| StoreError::InvalidTime(value.to_string()))
}

/// File-backed store laid out as `<root>/<granularity>/<FROM>-<TO>.csv`
#[derive(Debug, Clone)]
pub struct PairStore {
    root: PathBuf,
}

impl PairStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the per-granularity directories if missing
    pub fn ensure_layout(&self) -> Result<(), StoreError> {
        for granularity in Granularity::ALL {
            fs::create_dir_all(self.root.join(granularity.dir_name()))?;
        }
        Ok(())
    }

    pub fn path_for(&self, pair: &Pair, granularity: Granularity) -> PathBuf {
        self.root
            .join(granularity.dir_name())
            .join(format!("{}.csv", pair))
    }

    /// Load the persisted series, if any.
    ///
    /// A missing or empty file is `None`. So is a file that fails to parse:
    /// the caller then re-walks the full history and overwrites it.
    pub fn load(&self, pair: &Pair, granularity: Granularity) -> Option<Series> {
        let path = self.path_for(pair, granularity);
        if !path.is_file() {
            return None;
        }

        match read_series(&path) {
            Ok(series) if series.is_empty() => None,
            Ok(series) => {
                debug!("Loaded {} points from {}", series.len(), path.display());
                Some(series)
            }
            Err(e) => {
                warn!(
                    "Ignoring unreadable series file {}: {} (full re-walk)",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Replace the persisted file with `series`.
    ///
    /// Rows go to a temporary sibling first and are renamed into place, so a
    /// reader never observes a partially written file.
    pub fn save(
        &self,
        pair: &Pair,
        granularity: Granularity,
        series: &Series,
    ) -> Result<PathBuf, StoreError> {
        let path = self.path_for(pair, granularity);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let tmp = path.with_extension("csv.tmp");
        if let Err(e) = write_series(&tmp, series) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &path)?;

        debug!("Saved {} points to {}", series.len(), path.display());
        Ok(path)
    }

    /// Most recent modification time among the files quoted in `to_currency`
    pub fn last_refreshed(
        &self,
        granularity: Granularity,
        to_currency: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let dir = self.root.join(granularity.dir_name());
        if !dir.is_dir() {
            return Ok(None);
        }

        let suffix = format!("-{}.csv", to_currency);
        let mut latest: Option<DateTime<Utc>> = None;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if !name.to_string_lossy().ends_with(&suffix) {
                continue;
            }
            let modified: DateTime<Utc> = entry.metadata()?.modified()?.into();
            latest = Some(latest.map_or(modified, |l| l.max(modified)));
        }
        Ok(latest)
    }
}

fn read_series(path: &Path) -> Result<Series, StoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut series = Series::new();
    for row in reader.deserialize::<CsvRow>() {
        series.push(row?.into_point()?);
    }
    series
        .validate()
        .map_err(|(previous, next)| StoreError::Unordered { previous, next })?;
    Ok(series)
}

fn write_series(path: &Path, series: &Series) -> Result<(), StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(CSV_HEADER)?;
    for point in series.points() {
        writer.serialize(CsvRow::from_point(point)?)?;
    }
    writer.flush()?;
    Ok(())
}
