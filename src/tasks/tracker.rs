//! Tracker task - runs the retention engine on a fixed period

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::clock::Clock;
use crate::engine::{CompactionOutcome, RetentionEngine};
use crate::routes::metrics::Metrics;

/// Serialized driver for [`RetentionEngine::run_cycle`].
///
/// Each tick awaits the whole cycle before the next tick is polled; a cycle
/// that overruns the period pushes later ticks back instead of overlapping.
pub struct Scheduler<C: Clock> {
    engine: RetentionEngine,
    clock: C,
    period: Duration,
    metrics: Arc<Metrics>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(engine: RetentionEngine, clock: C, period: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            engine,
            clock,
            period,
            metrics,
        }
    }

    /// Tick forever. The first cycle runs immediately.
    pub async fn run(mut self) {
        let mut interval = self.interval();

        info!(period_secs = self.period.as_secs(), "Tracker task started");

        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// Run exactly `cycles` ticks on the normal schedule, then return
    pub async fn run_ticks(&mut self, cycles: usize) {
        let mut interval = self.interval();
        for _ in 0..cycles {
            interval.tick().await;
            self.tick().await;
        }
    }

    pub fn engine(&self) -> &RetentionEngine {
        &self.engine
    }

    fn interval(&self) -> tokio::time::Interval {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    async fn tick(&mut self) {
        let now = self.clock.now();

        match self.engine.run_cycle(now).await {
            Ok(report) => {
                self.metrics.record_cycle(&report);
                if let CompactionOutcome::Compacted { replaced, .. } = report.compaction {
                    info!(replaced = replaced, expired = report.expired, "Cycle complete");
                }
            }
            Err(e) => {
                self.metrics.record_failed_cycle(&e);
                error!(error = %e.source, now = %now, "Tracker cycle failed");
            }
        }
    }
}

/// Background task entry point used by `main`
pub async fn tracker_task<C: Clock>(scheduler: Scheduler<C>) {
    scheduler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::AnchoredClock;
    use crate::error::{AppError, Result};
    use crate::models::{RetentionPolicy, Sample, TimeRange};
    use crate::services::mocks::{MockPrices, MockRates};
    use crate::services::price_source::PriceSource;
    use crate::store::{InMemorySampleStore, SampleStore};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    fn rates() -> Arc<MockRates> {
        let mut mock = MockRates::new();
        mock.expect_fetch_rate().returning(|| Ok(0.306));
        Arc::new(mock)
    }

    fn prices() -> Arc<MockPrices> {
        let mut mock = MockPrices::new();
        mock.expect_fetch_price().returning(|| Ok(2000.0));
        Arc::new(mock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_midnight_rollover_compacts_previous_day() {
        let origin = Utc.with_ymd_and_hms(2024, 3, 9, 23, 45, 0).unwrap();
        let store = Arc::new(InMemorySampleStore::new());
        let metrics = Arc::new(Metrics::new());
        let engine = RetentionEngine::new(store.clone(), rates(), prices(), RetentionPolicy::default());
        let mut scheduler = Scheduler::new(
            engine,
            AnchoredClock::new(origin),
            Duration::from_secs(60),
            metrics.clone(),
        );

        // 15 ticks before midnight, 15 after.
        scheduler.run_ticks(30).await;

        let midnight = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let day_before = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();

        let yesterday = store
            .find_range(TimeRange::between(day_before, midnight))
            .await
            .unwrap();
        assert_eq!(yesterday.len(), 1);
        assert_eq!(yesterday[0].timestamp, day_before);
        assert_eq!(yesterday[0].raw_price, 2000.0);

        assert_eq!(store.len(), 16);

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.cycles_total, 30);
        assert_eq!(snapshot.compactions_total, 1);
        assert_eq!(snapshot.samples_compacted_total, 15);
    }

    /// Price source that takes longer than the tick period
    struct SlowPrices;

    #[async_trait]
    impl PriceSource for SlowPrices {
        async fn fetch_price(&self) -> Result<f64> {
            tokio::time::sleep(Duration::from_secs(150)).await;
            Ok(2000.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycles_do_not_overlap() {
        let origin = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        let store = Arc::new(InMemorySampleStore::new());
        let engine = RetentionEngine::new(
            store.clone(),
            rates(),
            Arc::new(SlowPrices),
            RetentionPolicy::default(),
        );
        let mut scheduler = Scheduler::new(
            engine,
            AnchoredClock::new(origin),
            Duration::from_secs(60),
            Arc::new(Metrics::new()),
        );

        scheduler.run_ticks(3).await;

        let mut stamps: Vec<_> = store.snapshot().iter().map(|s| s.timestamp).collect();
        stamps.sort();
        assert_eq!(stamps.len(), 3);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= chrono::Duration::seconds(150));
        }
    }

    /// Store that refuses every range delete
    struct ReadOnlyStore;

    #[async_trait]
    impl SampleStore for ReadOnlyStore {
        async fn insert(&self, _sample: &Sample) -> Result<()> {
            Ok(())
        }

        async fn find_range(&self, _range: TimeRange) -> Result<Vec<Sample>> {
            Ok(Vec::new())
        }

        async fn delete_range(&self, _range: TimeRange) -> Result<u64> {
            Err(AppError::Store("read-only transaction".into()))
        }

        async fn recent(&self, _range: Option<TimeRange>, _limit: usize) -> Result<Vec<Sample>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycles_keep_the_schedule() {
        let origin = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        let metrics = Arc::new(Metrics::new());
        let engine = RetentionEngine::new(
            Arc::new(ReadOnlyStore),
            rates(),
            prices(),
            RetentionPolicy::default(),
        );
        let mut scheduler = Scheduler::new(
            engine,
            AnchoredClock::new(origin),
            Duration::from_secs(60),
            metrics.clone(),
        );

        scheduler.run_ticks(5).await;

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.cycle_failures_total, 5);
        assert_eq!(snapshot.cycles_total, 0);
        assert_eq!(snapshot.samples_ingested_total, 5);
        assert_eq!(snapshot.rate_refresh_failures_total, 0);
        assert!((scheduler.engine().current_rate() - 0.308).abs() < 1e-12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycles_still_count_rate_and_ingest_outcomes() {
        let origin = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        let metrics = Arc::new(Metrics::new());
        let mut rates = MockRates::new();
        rates
            .expect_fetch_rate()
            .returning(|| Err(AppError::TransientFetch("connection refused".into())));
        let mut prices = MockPrices::new();
        prices
            .expect_fetch_price()
            .returning(|| Err(AppError::TransientFetch("timeout".into())));
        let engine = RetentionEngine::new(
            Arc::new(ReadOnlyStore),
            Arc::new(rates),
            Arc::new(prices),
            RetentionPolicy::default(),
        );
        let mut scheduler = Scheduler::new(
            engine,
            AnchoredClock::new(origin),
            Duration::from_secs(60),
            metrics.clone(),
        );

        scheduler.run_ticks(3).await;

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.cycle_failures_total, 3);
        assert_eq!(snapshot.rate_refresh_failures_total, 3);
        assert_eq!(snapshot.ingest_skipped_total, 3);
        assert_eq!(snapshot.samples_ingested_total, 0);
    }
}
