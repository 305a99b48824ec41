use cryptoscrap::exchange::{ConnectivityGate, CryptoCompareClient};
use cryptoscrap::scrape::ScrapeOrchestrator;
use shared::{CatalogClient, Config};

pub struct AppState {
    pub config: Config,
    pub catalog: CatalogClient,
    /// Awaited once at the start of every pass, not per pair
    pub gate: ConnectivityGate,
    pub orchestrator: ScrapeOrchestrator<CryptoCompareClient>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let catalog = CatalogClient::from_config(&config)?;
        let gate = config.connectivity_gate();
        let orchestrator =
            ScrapeOrchestrator::from_config(config.histo_client()?, &config.scrape_config());

        tracing::info!(
            "Data root {}, {} candles quoted in {}",
            config.data_root.display(),
            config.granularity,
            config.to_currencies.join(", ")
        );

        Ok(AppState {
            config,
            catalog,
            gate,
            orchestrator,
        })
    }
}
