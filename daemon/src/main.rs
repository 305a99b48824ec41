use anyhow::Result;
use cryptoscrap::scrape::cancel_signal;
use shared::Config;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod scheduler;
mod state;
mod version;

use crate::{scheduler::Scheduler, state::AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Cryptoscrap {}", version::summary());

    let config = Config::from_env()?;
    let app_state = Arc::new(AppState::new(config)?);
    tracing::info!("AppState initialized");

    let (cancel_handle, cancel) = cancel_signal();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, finishing the current pair...");
                cancel_handle.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    Scheduler::new(app_state, cancel).run().await?;

    tracing::info!("Cryptoscrap stopped");
    Ok(())
}
