//! OHLCV candle data structures

use serde::{Deserialize, Serialize};

/// One OHLCV record for a time bucket, as served by the histo endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Bucket start, seconds since epoch
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Volume in the from-symbol
    pub volume_from: f64,
    /// Volume in the to-symbol
    pub volume_to: f64,
}

impl SeriesPoint {
    /// Create a new point
    pub fn new(
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume_from: f64,
        volume_to: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume_from,
            volume_to,
        }
    }

    /// Placeholder the API emits for buckets before a pair was listed.
    pub fn padding(timestamp: i64) -> Self {
        Self::new(timestamp, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// `high == 0 && low == 0`: no trading data at or before this bucket
    pub fn is_padding(&self) -> bool {
        self.high == 0.0 && self.low == 0.0
    }
}

/// Ordered run of points for one pair at one granularity.
///
/// Timestamps are expected to be strictly increasing. Constructors do not
/// enforce it so that walked pages can be assembled cheaply; call
/// [`Series::validate`] before anything is persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Create new empty series
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create from vector of points
    pub fn from_vec(points: Vec<SeriesPoint>) -> Self {
        Self { points }
    }

    /// Add a point at the end
    pub fn push(&mut self, point: SeriesPoint) {
        self.points.push(point);
    }

    /// Get number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if series is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Earliest point
    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.first()
    }

    /// Latest point, the high-water mark of a persisted series
    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Get all points
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Get timestamps as vector
    pub fn timestamps(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Remove and return the latest point
    pub fn pop(&mut self) -> Option<SeriesPoint> {
        self.points.pop()
    }

    /// Put an older page in front of this series.
    pub fn prepend(&mut self, older: Series) {
        let mut points = older.points;
        points.append(&mut self.points);
        self.points = points;
    }

    /// Append newer points at the end.
    pub fn extend<I: IntoIterator<Item = SeriesPoint>>(&mut self, newer: I) {
        self.points.extend(newer);
    }

    /// Sort by timestamp and drop duplicate timestamps, keeping the first.
    pub fn normalize(&mut self) {
        self.points.sort_by_key(|p| p.timestamp);
        self.points.dedup_by_key(|p| p.timestamp);
    }

    /// Check that timestamps are strictly increasing.
    ///
    /// Returns the offending `(previous, next)` timestamps on failure.
    pub fn validate(&self) -> Result<(), (i64, i64)> {
        match self
            .points
            .windows(2)
            .find(|w| w[1].timestamp <= w[0].timestamp)
        {
            Some(w) => Err((w[0].timestamp, w[1].timestamp)),
            None => Ok(()),
        }
    }
}

impl From<Vec<SeriesPoint>> for Series {
    fn from(points: Vec<SeriesPoint>) -> Self {
        Self::from_vec(points)
    }
}

impl IntoIterator for Series {
    type Item = SeriesPoint;
    type IntoIter = std::vec::IntoIter<SeriesPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}
