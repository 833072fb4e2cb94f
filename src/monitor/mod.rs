//! Monitor facade and sampling loop
//!
//! Owns the telemetry source, catalog, history store, and cost settings, and
//! exposes the query surface a presentation layer polls. The sampling loop is
//! the only history writer; the current reading is handed out as an
//! atomically swapped immutable `Arc` snapshot, `None` before the first
//! successful tick.

use crate::catalog::Catalog;
use crate::core::{AggregatePowerReading, Config, Error, Result};
use crate::engine;
use crate::history::{HistoryRecord, HistoryStore, Period};
use crate::pricing::{self, CostProjection};
use crate::telemetry::TelemetrySource;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

pub struct Monitor {
    source: Arc<dyn TelemetrySource>,
    catalog: Arc<Catalog>,
    /// Mutation is serialized through the sampling loop; presentation-side
    /// reads go through the same lock and see whole records only
    store: Mutex<HistoryStore>,
    current: RwLock<Option<Arc<AggregatePowerReading>>>,
    rate_per_kwh: RwLock<f64>,
    telemetry_timeout: Duration,
    degraded: bool,
}

impl Monitor {
    pub fn new(
        source: Box<dyn TelemetrySource>,
        catalog: Catalog,
        store: HistoryStore,
        config: &Config,
        degraded: bool,
    ) -> Self {
        Self {
            source: Arc::from(source),
            catalog: Arc::new(catalog),
            store: Mutex::new(store),
            current: RwLock::new(None),
            rate_per_kwh: RwLock::new(config.pricing.rate_per_kwh),
            telemetry_timeout: Duration::from_secs(config.sampling.telemetry_timeout_secs),
            degraded,
        }
    }

    /// One unit of work: sample -> estimate -> publish -> append.
    ///
    /// A telemetry timeout or sample error skips the tick (no reading
    /// published, no history append). A rejected append leaves the published
    /// reading in place. Either way the error is returned for logging and
    /// the loop continues.
    pub async fn tick(&self) -> Result<()> {
        let source = Arc::clone(&self.source);
        let sample_task = tokio::task::spawn_blocking(move || source.sample());

        let snapshot = match tokio::time::timeout(self.telemetry_timeout, sample_task).await {
            Err(_) => {
                return Err(Error::TelemetryTimeout {
                    timeout_secs: self.telemetry_timeout.as_secs(),
                })
            }
            Ok(Err(join_err)) => return Err(Error::Telemetry(join_err.to_string())),
            Ok(Ok(sample)) => sample?,
        };

        let reading = Arc::new(engine::estimate(&snapshot, &self.catalog));

        *self.current.write().unwrap() = Some(Arc::clone(&reading));

        let mut store = self.store.lock().await;
        store.append(&reading)?;

        Ok(())
    }

    /// Run the sampling loop forever. Failures are logged per occurrence and
    /// never terminate the loop.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        log::info!(
            "Sampling loop started ({}s interval, source: {})",
            interval.as_secs(),
            self.source.name()
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                match e {
                    Error::TelemetryTimeout { .. } => {
                        log::warn!("{}, tick skipped", e);
                    }
                    Error::NonMonotonicTimestamp { .. } => {
                        log::warn!("{}, record dropped", e);
                    }
                    other => {
                        log::warn!("Tick failed: {}", other);
                    }
                }
            }
        }
    }

    /// Latest aggregate reading, `None` before the first successful tick
    pub fn current_reading(&self) -> Option<Arc<AggregatePowerReading>> {
        self.current.read().unwrap().clone()
    }

    /// Whether the monitor runs without a direct-power collaborator
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn set_cost_rate(&self, rate_per_kwh: f64) {
        *self.rate_per_kwh.write().unwrap() = rate_per_kwh;
    }

    pub fn cost_rate(&self) -> f64 {
        *self.rate_per_kwh.read().unwrap()
    }

    /// History records in `[start, end]`
    pub async fn history_range(&self, start: i64, end: i64) -> Result<Vec<HistoryRecord>> {
        self.store.lock().await.query_range(start, end)
    }

    /// Total energy per day or month
    pub async fn history_aggregate(&self, period: Period) -> Result<BTreeMap<String, f64>> {
        self.store.lock().await.aggregate(period)
    }

    /// Projected daily/monthly cost from the rolling last 24 hours
    pub async fn projected_cost(&self) -> Result<CostProjection> {
        let rate = self.cost_rate();
        let store = self.store.lock().await;
        pricing::project(&store, rate, chrono::Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Component, ComponentKind, TelemetrySnapshot};
    use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

    fn test_catalog() -> Catalog {
        Catalog::new(vec![
            Component::new("cpu0", ComponentKind::Cpu, "Test CPU").with_tdp(65.0)
        ])
    }

    fn test_monitor(source: Box<dyn TelemetrySource>) -> Monitor {
        let store = HistoryStore::open_in_memory(5).unwrap();
        Monitor::new(source, test_catalog(), store, &Config::default(), false)
    }

    /// Source that fails the first `failures` samples, then succeeds with
    /// strictly increasing timestamps
    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
        next_timestamp: AtomicI64,
    }

    impl FlakySource {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                next_timestamp: AtomicI64::new(1_700_000_000),
            }
        }
    }

    impl TelemetrySource for FlakySource {
        fn sample(&self) -> Result<TelemetrySnapshot> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(Error::Telemetry("sensor unresponsive".to_string()));
            }
            let ts = self.next_timestamp.fetch_add(5, Ordering::SeqCst);
            let mut snapshot = TelemetrySnapshot::new(ts);
            snapshot.insert_direct("cpu0", 50.0);
            Ok(snapshot)
        }

        fn name(&self) -> &str {
            "flaky"
        }

        fn is_estimated(&self) -> bool {
            false
        }
    }

    /// Source that always reports the same timestamp
    struct FrozenClockSource;

    impl TelemetrySource for FrozenClockSource {
        fn sample(&self) -> Result<TelemetrySnapshot> {
            let mut snapshot = TelemetrySnapshot::new(1_700_000_000);
            snapshot.insert_direct("cpu0", 50.0);
            Ok(snapshot)
        }

        fn name(&self) -> &str {
            "frozen"
        }

        fn is_estimated(&self) -> bool {
            false
        }
    }

    /// Source that blocks longer than any reasonable timeout
    struct SlowSource;

    impl TelemetrySource for SlowSource {
        fn sample(&self) -> Result<TelemetrySnapshot> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(TelemetrySnapshot::new(1_700_000_000))
        }

        fn name(&self) -> &str {
            "slow"
        }

        fn is_estimated(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_no_reading_before_first_tick() {
        let monitor = test_monitor(Box::new(FlakySource::new(0)));
        assert!(monitor.current_reading().is_none());

        monitor.tick().await.unwrap();
        let reading = monitor.current_reading().unwrap();
        assert!((reading.total_watts - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_tick_skipped_then_recovers() {
        let monitor = test_monitor(Box::new(FlakySource::new(1)));

        // Tick N: source fails, nothing published, nothing appended
        assert!(monitor.tick().await.is_err());
        assert!(monitor.current_reading().is_none());
        assert_eq!(monitor.history_range(0, i64::MAX).await.unwrap().len(), 0);

        // Tick N+1 proceeds normally
        monitor.tick().await.unwrap();
        assert!(monitor.current_reading().is_some());
        assert_eq!(monitor.history_range(0, i64::MAX).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_telemetry_timeout_skips_tick() {
        let mut config = Config::default();
        config.sampling.telemetry_timeout_secs = 0;
        let store = HistoryStore::open_in_memory(5).unwrap();
        let monitor = Monitor::new(Box::new(SlowSource), test_catalog(), store, &config, false);

        let err = monitor.tick().await.unwrap_err();
        assert!(matches!(err, Error::TelemetryTimeout { .. }));
        assert!(monitor.current_reading().is_none());
        assert_eq!(monitor.history_range(0, i64::MAX).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_non_monotonic_append_does_not_corrupt_history() {
        let monitor = test_monitor(Box::new(FrozenClockSource));

        monitor.tick().await.unwrap();
        let err = monitor.tick().await.unwrap_err();
        assert!(matches!(err, Error::NonMonotonicTimestamp { .. }));

        let records = monitor.history_range(0, i64::MAX).await.unwrap();
        assert_eq!(records.len(), 1);
        // The published reading stays valid
        assert!(monitor.current_reading().is_some());
    }

    #[tokio::test]
    async fn test_cost_rate_and_projection() {
        let monitor = test_monitor(Box::new(FlakySource::new(0)));
        monitor.set_cost_rate(0.20);
        assert!((monitor.cost_rate() - 0.20).abs() < 1e-12);

        let projection = monitor.projected_cost().await.unwrap();
        assert_eq!(projection.daily, 0.0);
        assert_eq!(projection.monthly, 0.0);
    }
}
