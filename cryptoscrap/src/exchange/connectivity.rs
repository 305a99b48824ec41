//! Network reachability precondition

use crate::scrape::{sleep_or_cancel, CancelSignal, ScrapeError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, warn};

pub const DEFAULT_PROBE_HOST: &str = "8.8.8.8:53";

/// Blocks a pass until a well-known host accepts a TCP connection.
#[derive(Debug, Clone)]
pub struct ConnectivityGate {
    host: String,
    probe_timeout: Duration,
    retry_interval: Duration,
    max_attempts: Option<u32>,
}

impl ConnectivityGate {
    /// Unbounded gate; only cancellation ends the wait early
    pub fn new(host: impl Into<String>, retry_interval: Duration) -> Self {
        Self {
            host: host.into(),
            probe_timeout: Duration::from_secs(5),
            retry_interval,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Single probe
    pub async fn is_reachable(&self) -> bool {
        matches!(
            timeout(self.probe_timeout, TcpStream::connect(self.host.as_str())).await,
            Ok(Ok(_))
        )
    }

    /// Probe until reachable, retrying every `retry_interval`.
    pub async fn wait_until_reachable(&self, cancel: &CancelSignal) -> Result<(), ScrapeError> {
        let mut attempts = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            attempts += 1;

            if self.is_reachable().await {
                if attempts > 1 {
                    info!("Connectivity to {} restored after {} attempts", self.host, attempts);
                }
                return Ok(());
            }

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(ScrapeError::ConnectivityLost { attempts });
            }

            warn!(
                "{} unreachable (attempt {}), retrying in {}s",
                self.host,
                attempts,
                self.retry_interval.as_secs()
            );
            if !sleep_or_cancel(self.retry_interval, cancel).await {
                return Err(ScrapeError::Cancelled);
            }
        }
    }
}
