//! Pair-level error taxonomy

use crate::data::StoreError;
use crate::exchange::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The API has no history for the pair; exclude it going forward.
    #[error("no data for {0}")]
    NoData(String),

    /// Network, HTTP or decoding failure; abort this pair, keep going.
    #[error(transparent)]
    Fetch(FetchError),

    /// A merged series broke ordering or uniqueness. Never persisted.
    #[error("consistency violation for {pair}: {detail}")]
    Consistency { pair: String, detail: String },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("connectivity lost after {attempts} attempts")]
    ConnectivityLost { attempts: u32 },

    #[error("cancelled")]
    Cancelled,
}

impl From<FetchError> for ScrapeError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NoDataForSymbol(message) => Self::NoData(message),
            other => Self::Fetch(other),
        }
    }
}

/// Failure classes recorded in a pass report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Consistency,
    Storage,
    Connectivity,
}

impl ScrapeError {
    /// Report class, or `None` for outcomes that are not failures
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Fetch(_) => Some(FailureKind::Transient),
            Self::Consistency { .. } => Some(FailureKind::Consistency),
            Self::Storage(_) => Some(FailureKind::Storage),
            Self::ConnectivityLost { .. } => Some(FailureKind::Connectivity),
            Self::NoData(_) | Self::Cancelled => None,
        }
    }
}
