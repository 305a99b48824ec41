//! Integration tests for cryptoscrap: pagination, merging and orchestration

use cryptoscrap::data::{Granularity, IgnoreListStore, Pair, PairStore, Series, SeriesPoint};
use cryptoscrap::exchange::{FetchError, PageFetcher};
use cryptoscrap::scrape::{
    cancel_signal, merge, resolve_universe, CancelHandle, CancelSignal, FailureKind, PaginationWalker,
    PairOutcome, ScrapeError, ScrapeOrchestrator,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

const MINUTE: i64 = 60;

/// Canned upstream behaviour for one from-symbol
#[derive(Clone)]
enum Upstream {
    /// Serve the last `limit + 1` points at or before `toTs`
    History(Vec<SeriesPoint>),
    /// Serve the same raw page for every request
    Fixed(Vec<SeriesPoint>),
    Fail(FetchError),
}

/// In-memory stand-in for the histo API
struct MockApi {
    upstream: HashMap<String, Upstream>,
    /// Requests with `toTs` below this fail with `WindowTooOld`
    window_floor: Option<i64>,
    calls: Mutex<Vec<(String, i64)>>,
}

impl MockApi {
    fn new() -> Self {
        Self {
            upstream: HashMap::new(),
            window_floor: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with(mut self, symbol: &str, upstream: Upstream) -> Self {
        self.upstream.insert(symbol.to_string(), upstream);
        self
    }

    fn with_window_floor(mut self, floor: i64) -> Self {
        self.window_floor = Some(floor);
        self
    }

    fn calls_for(&self, symbol: &str) -> Vec<i64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == symbol)
            .map(|(_, ts)| *ts)
            .collect()
    }
}

impl PageFetcher for MockApi {
    async fn fetch_page(
        &self,
        pair: &Pair,
        _granularity: Granularity,
        limit: u32,
        to_timestamp: i64,
    ) -> Result<Series, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((pair.from.clone(), to_timestamp));

        if self.window_floor.is_some_and(|floor| to_timestamp < floor) {
            return Err(FetchError::WindowTooOld(
                "Data only available for the last 7 days".to_string(),
            ));
        }

        match self.upstream.get(&pair.from) {
            Some(Upstream::History(points)) => {
                let eligible: Vec<SeriesPoint> = points
                    .iter()
                    .filter(|p| p.timestamp <= to_timestamp)
                    .copied()
                    .collect();
                let start = eligible.len().saturating_sub(limit as usize + 1);
                Ok(Series::from_vec(eligible[start..].to_vec()))
            }
            Some(Upstream::Fixed(points)) => Ok(Series::from_vec(points.clone())),
            Some(Upstream::Fail(err)) => Err(err.clone()),
            None => Err(FetchError::NoDataForSymbol(format!(
                "There is no data for the symbol {} .",
                pair.from
            ))),
        }
    }
}

fn point(ts: i64) -> SeriesPoint {
    let price = 100.0 + (ts / MINUTE) as f64 * 0.01;
    SeriesPoint::new(ts, price, price + 1.0, price - 1.0, price + 0.5, 12.5, 1_250.0)
}

/// Padding from `pad_from`, real candles from `listed_at` to `last`, one per minute
fn history(pad_from: i64, listed_at: i64, last: i64) -> Vec<SeriesPoint> {
    (pad_from..=last)
        .step_by(MINUTE as usize)
        .map(|ts| if ts < listed_at { SeriesPoint::padding(ts) } else { point(ts) })
        .collect()
}

fn strictly_increasing(series: &Series) -> bool {
    series.points().windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_walk_stops_at_padding() {
    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let walker = PaginationWalker::new(&api, 99);

    let series = walker
        .walk_backward(&Pair::new("ETH", "USD"), Granularity::Minute, 0, &CancelSignal::never())
        .await
        .unwrap();

    assert!(series.first().unwrap().is_padding());
    assert_eq!(series.last().unwrap().timestamp, 72_000);
    assert!(strictly_increasing(&series));

    // 401 points in pages of 100; the head is padding after the fourth page
    let calls = api.calls_for("ETH");
    assert_eq!(calls.len(), 4);
    assert!(calls.windows(2).all(|w| w[1] < w[0]));
}

#[tokio::test]
async fn test_walk_stops_at_known_tail() {
    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let walker = PaginationWalker::new(&api, 99);

    let series = walker
        .walk_backward(&Pair::new("ETH", "USD"), Granularity::Minute, 66_000, &CancelSignal::never())
        .await
        .unwrap();

    assert!(series.first().unwrap().timestamp <= 66_000);
    assert_eq!(api.calls_for("ETH").len(), 2);
}

#[tokio::test]
async fn test_first_page_already_satisfies_stop_condition() {
    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let walker = PaginationWalker::new(&api, 2000);

    // one page reaches the padding
    let series = walker
        .walk_backward(&Pair::new("ETH", "USD"), Granularity::Minute, 0, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(series.len(), 401);
    assert_eq!(api.calls_for("ETH").len(), 1);

    // tail is already the newest point
    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let walker = PaginationWalker::new(&api, 10);
    walker
        .walk_backward(&Pair::new("ETH", "USD"), Granularity::Minute, 72_000, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(api.calls_for("ETH").len(), 1);
}

#[tokio::test]
async fn test_walk_terminates_without_padding() {
    // history starts with real data: pages eventually run dry
    let api = MockApi::new().with("ETH", Upstream::History(history(54_000, 54_000, 72_000)));
    let walker = PaginationWalker::new(&api, 49);

    let series = walker
        .walk_backward(&Pair::new("ETH", "USD"), Granularity::Minute, 0, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(series.len(), 301);
    assert_eq!(series.first().unwrap().timestamp, 54_000);
    assert!(api.calls_for("ETH").len() <= 8);
}

#[tokio::test]
async fn test_walk_stops_at_retention_window() {
    let api = MockApi::new()
        .with("ETH", Upstream::History(history(48_000, 54_000, 72_000)))
        .with_window_floor(65_000);
    let walker = PaginationWalker::new(&api, 99);

    let series = walker
        .walk_backward(&Pair::new("ETH", "USD"), Granularity::Minute, 0, &CancelSignal::never())
        .await
        .unwrap();

    // pages ending at now and 66_000 survive, the one below the floor is refused
    assert_eq!(series.first().unwrap().timestamp, 60_060);
    assert_eq!(series.last().unwrap().timestamp, 72_000);
}

#[tokio::test]
async fn test_walk_propagates_transient_failure() {
    let api = MockApi::new().with(
        "ETH",
        Upstream::Fail(FetchError::Transient("connection reset".to_string())),
    );
    let walker = PaginationWalker::new(&api, 99);

    let result = walker
        .walk_backward(&Pair::new("ETH", "USD"), Granularity::Minute, 0, &CancelSignal::never())
        .await;
    assert!(matches!(result, Err(ScrapeError::Fetch(FetchError::Transient(_)))));
}

#[tokio::test]
async fn test_walk_honours_cancellation() {
    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let walker = PaginationWalker::new(&api, 99);
    let (handle, signal) = cancel_signal();
    handle.cancel();

    let result = walker
        .walk_backward(&Pair::new("ETH", "USD"), Granularity::Minute, 0, &signal)
        .await;
    assert!(matches!(result, Err(ScrapeError::Cancelled)));
    assert!(api.calls_for("ETH").is_empty());
}

// ---------------------------------------------------------------------------
// Walk + merge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_two_page_splice_onto_single_stored_point() {
    let tail = 60_000;
    let stored_point = SeriesPoint::new(tail, 1.0, 2.0, 0.5, 1.5, 3.0, 4.0);
    let existing = Series::from_vec(vec![stored_point]);

    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let walker = PaginationWalker::new(&api, 199);
    let pair = Pair::new("ETH", "USD");

    let fresh = walker
        .walk_backward(&pair, Granularity::Minute, tail, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(api.calls_for("ETH").len(), 2);

    let merged = merge(&pair, Granularity::Minute, fresh, Some(&existing)).unwrap();

    assert_eq!(merged.first(), Some(&stored_point));
    assert_eq!(merged.len(), 1 + (72_000 - tail) as usize / 60);
    assert!(merged.points().iter().all(|p| p.timestamp >= tail));
    assert!(merged.points()[1..].iter().all(|p| p.timestamp > tail));
    assert!(strictly_increasing(&merged));
}

#[tokio::test]
async fn test_fresh_walk_drops_pre_listing_padding() {
    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let walker = PaginationWalker::new(&api, 99);
    let pair = Pair::new("ETH", "USD");

    let fresh = walker
        .walk_backward(&pair, Granularity::Minute, 0, &CancelSignal::never())
        .await
        .unwrap();
    let merged = merge(&pair, Granularity::Minute, fresh, None).unwrap();

    assert_eq!(merged.first().unwrap().timestamp, 54_000);
    assert!(merged.points().iter().all(|p| !p.is_padding()));
    assert!(strictly_increasing(&merged));
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

fn orchestrator(api: MockApi, root: &std::path::Path) -> ScrapeOrchestrator<MockApi> {
    ScrapeOrchestrator::new(api, PairStore::new(root), IgnoreListStore::in_root(root)).with_limit(99)
}

fn universe(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_no_data_symbol_goes_to_ignore_list() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new()
        .with("ETH", Upstream::History(history(48_000, 54_000, 72_000)))
        .with(
            "XYZ",
            Upstream::Fail(FetchError::NoDataForSymbol(
                "There is no data for the symbol XYZ .".to_string(),
            )),
        );
    let orchestrator = orchestrator(api, dir.path());

    let report = orchestrator
        .run(&universe(&["ETH", "XYZ"]), "USD", Granularity::Minute, &CancelSignal::never())
        .await;

    assert!(report.is_clean());
    assert_eq!(report.succeeded, universe(&["ETH"]));
    assert_eq!(report.excluded, universe(&["XYZ"]));

    let ignored = orchestrator.ignore_list().load_all().unwrap();
    assert!(ignored.contains("XYZ"));

    // next resolution drops it
    let ranked = universe(&["ETH", "XYZ", "LTC"]);
    let known: HashSet<String> = ranked.iter().cloned().collect();
    assert_eq!(resolve_universe(&ranked, &known, &ignored), universe(&["ETH", "LTC"]));
}

#[tokio::test]
async fn test_failing_pair_does_not_abort_pass() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new()
        .with("BTC", Upstream::Fail(FetchError::Transient("HTTP 502".to_string())))
        .with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let orchestrator = orchestrator(api, dir.path());

    let report = orchestrator
        .run(&universe(&["BTC", "ETH"]), "USD", Granularity::Minute, &CancelSignal::never())
        .await;

    assert_eq!(report.failed, vec![("BTC".to_string(), FailureKind::Transient)]);
    assert_eq!(report.succeeded, universe(&["ETH"]));
    assert!(orchestrator.ignore_list().load_all().unwrap().is_empty());
    assert!(orchestrator
        .store()
        .load(&Pair::new("BTC", "USD"), Granularity::Minute)
        .is_none());
}

#[tokio::test]
async fn test_consistency_violation_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new().with("BAD", Upstream::Fixed(vec![point(120), point(60), point(180)]));
    let orchestrator = orchestrator(api, dir.path());

    let report = orchestrator
        .run(&universe(&["BAD"]), "USD", Granularity::Minute, &CancelSignal::never())
        .await;

    assert_eq!(report.failed, vec![("BAD".to_string(), FailureKind::Consistency)]);
    assert!(!orchestrator
        .store()
        .path_for(&Pair::new("BAD", "USD"), Granularity::Minute)
        .exists());
}

#[tokio::test]
async fn test_rerun_without_new_data_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let orchestrator = orchestrator(api, dir.path());
    let pair = Pair::new("ETH", "USD");

    let first = orchestrator
        .scrape_pair(&pair, Granularity::Minute, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(first, PairOutcome::Updated { added: 301, total: 301 });

    let path = orchestrator.store().path_for(&pair, Granularity::Minute);
    let before = std::fs::read_to_string(&path).unwrap();

    let second = orchestrator
        .scrape_pair(&pair, Granularity::Minute, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(second, PairOutcome::Unchanged { total: 301 });
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[tokio::test]
async fn test_incremental_update_extends_stored_file() {
    let dir = tempfile::tempdir().unwrap();
    let pair = Pair::new("ETH", "USD");

    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 66_000)));
    orchestrator(api, dir.path())
        .scrape_pair(&pair, Granularity::Minute, &CancelSignal::never())
        .await
        .unwrap();

    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let orchestrator = orchestrator(api, dir.path());
    let outcome = orchestrator
        .scrape_pair(&pair, Granularity::Minute, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(outcome, PairOutcome::Updated { added: 100, total: 301 });

    // only the pages above the stored tail were requested
    assert_eq!(orchestrator.fetcher().calls_for("ETH").len(), 2);

    let stored = orchestrator.store().load(&pair, Granularity::Minute).unwrap();
    assert_eq!(stored.first().unwrap().timestamp, 54_000);
    assert_eq!(stored.last().unwrap().timestamp, 72_000);
    assert!(strictly_increasing(&stored));
}

#[tokio::test]
async fn test_to_currency_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let orchestrator = orchestrator(api, dir.path());

    let report = orchestrator
        .run(&universe(&["USD", "ETH"]), "USD", Granularity::Minute, &CancelSignal::never())
        .await;

    assert_eq!(report.succeeded, universe(&["ETH"]));
    assert!(report.excluded.is_empty());
}

#[tokio::test]
async fn test_cancelled_pass_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new().with("ETH", Upstream::History(history(48_000, 54_000, 72_000)));
    let orchestrator = orchestrator(api, dir.path());
    let (handle, signal) = cancel_signal();
    handle.cancel();

    let report = orchestrator
        .run(&universe(&["ETH"]), "USD", Granularity::Minute, &signal)
        .await;

    assert!(report.cancelled);
    assert!(report.succeeded.is_empty());
    assert!(orchestrator
        .store()
        .load(&Pair::new("ETH", "USD"), Granularity::Minute)
        .is_none());
}

/// Fires the cancel handle when asked for `trigger`, then serves the page
struct CancellingApi {
    inner: MockApi,
    trigger: String,
    handle: CancelHandle,
}

impl PageFetcher for CancellingApi {
    async fn fetch_page(
        &self,
        pair: &Pair,
        granularity: Granularity,
        limit: u32,
        to_timestamp: i64,
    ) -> Result<Series, FetchError> {
        if pair.from == self.trigger {
            self.handle.cancel();
        }
        self.inner.fetch_page(pair, granularity, limit, to_timestamp).await
    }
}

fn cancelling_orchestrator(
    root: &std::path::Path,
    limit: u32,
) -> (ScrapeOrchestrator<CancellingApi>, CancelSignal) {
    let inner = MockApi::new()
        .with("ETH", Upstream::History(history(48_000, 54_000, 72_000)))
        .with("LTC", Upstream::History(history(48_000, 54_000, 72_000)))
        .with("XRP", Upstream::History(history(48_000, 54_000, 72_000)));
    let (handle, signal) = cancel_signal();
    let api = CancellingApi {
        inner,
        trigger: "LTC".to_string(),
        handle,
    };
    let orchestrator =
        ScrapeOrchestrator::new(api, PairStore::new(root), IgnoreListStore::in_root(root)).with_limit(limit);
    (orchestrator, signal)
}

#[tokio::test]
async fn test_cancel_during_pass_abandons_in_flight_pair() {
    let dir = tempfile::tempdir().unwrap();
    // small pages: LTC needs several, the cancel lands between them
    let (orchestrator, signal) = cancelling_orchestrator(dir.path(), 99);

    let report = orchestrator
        .run(&universe(&["ETH", "LTC", "XRP"]), "USD", Granularity::Minute, &signal)
        .await;

    assert!(report.cancelled);
    assert_eq!(report.succeeded, universe(&["ETH"]));
    assert!(report.failed.is_empty());

    let store = orchestrator.store();
    assert!(store.path_for(&Pair::new("ETH", "USD"), Granularity::Minute).exists());
    assert!(!store.path_for(&Pair::new("LTC", "USD"), Granularity::Minute).exists());
    assert!(!store.path_for(&Pair::new("XRP", "USD"), Granularity::Minute).exists());
    assert_eq!(orchestrator.fetcher().inner.calls_for("LTC").len(), 1);
    assert!(orchestrator.fetcher().inner.calls_for("XRP").is_empty());

    // the pair saved before the cancel is intact
    let eth = store.load(&Pair::new("ETH", "USD"), Granularity::Minute).unwrap();
    assert_eq!(eth.len(), 301);
}

#[tokio::test]
async fn test_cancel_during_pass_lets_single_page_pair_finish() {
    let dir = tempfile::tempdir().unwrap();
    // one page covers the whole history, so LTC completes before the check
    let (orchestrator, signal) = cancelling_orchestrator(dir.path(), 2000);

    let report = orchestrator
        .run(&universe(&["ETH", "LTC", "XRP"]), "USD", Granularity::Minute, &signal)
        .await;

    assert!(report.cancelled);
    assert_eq!(report.succeeded, universe(&["ETH", "LTC"]));

    let store = orchestrator.store();
    assert!(store.path_for(&Pair::new("LTC", "USD"), Granularity::Minute).exists());
    assert!(!store.path_for(&Pair::new("XRP", "USD"), Granularity::Minute).exists());
    assert!(orchestrator.fetcher().inner.calls_for("XRP").is_empty());
}

/// Shared buffer the fmt subscriber writes into
#[derive(Clone, Default)]
struct LogBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_pair_failure_is_logged_once_at_error_level() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new().with("BTC", Upstream::Fail(FetchError::Transient("HTTP 502".to_string())));
    let report = orchestrator(api, dir.path())
        .run(&universe(&["BTC"]), "USD", Granularity::Minute, &CancelSignal::never())
        .await;
    assert_eq!(report.failed.len(), 1);

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let line = output
        .lines()
        .find(|l| l.contains("Failed to scrape BTC-USD"))
        .unwrap();
    assert!(line.contains("ERROR"));
    assert_eq!(line.matches("ERROR").count(), 1);
}
