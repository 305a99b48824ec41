//! Resolution of the pair universe from the two symbol catalogs

use std::collections::HashSet;
use tracing::info;

/// CoinMarketCap symbols that CryptoCompare lists under another name
pub const SYMBOL_RENAMES: [(&str, &str); 3] = [("MIOTA", "IOT"), ("NANO", "XRB"), ("ETHOS", "BQX")];

/// Map a market-cap catalog symbol to its histo API name.
pub fn canonical_symbol(symbol: &str) -> &str {
    SYMBOL_RENAMES
        .iter()
        .find(|(from, _)| *from == symbol)
        .map_or(symbol, |(_, to)| *to)
}

/// Ranked symbols known to the histo API, minus ignored ones, in rank order.
pub fn resolve_universe(
    ranked: &[String],
    known: &HashSet<String>,
    ignored: &HashSet<String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let common: Vec<String> = ranked
        .iter()
        .map(|s| canonical_symbol(s))
        .filter(|s| known.contains(*s))
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect();

    info!("{} available coins on CoinMarketCap", ranked.len());
    info!("{} available coins on CryptoCompare", known.len());
    info!("{} available coins in common", common.len());

    let universe: Vec<String> = common
        .into_iter()
        .filter(|s| !ignored.contains(s))
        .collect();
    info!("{} coins after ignore list", universe.len());
    universe
}
