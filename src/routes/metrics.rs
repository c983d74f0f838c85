//! Prometheus metrics endpoint

use axum::response::IntoResponse;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::{CompactionOutcome, CycleError, CycleReport};

/// Tracker counters for Prometheus
#[derive(Default)]
pub struct Metrics {
    /// Cycles that ran to completion
    pub cycles_total: AtomicU64,
    /// Cycles aborted during expiry or compaction
    pub cycle_failures_total: AtomicU64,
    /// Rate refreshes that failed and kept the previous rate
    pub rate_refresh_failures_total: AtomicU64,
    /// Samples stored by ingestion
    pub samples_ingested_total: AtomicU64,
    /// Cycles where ingestion was skipped
    pub ingest_skipped_total: AtomicU64,
    /// Samples removed by the retention horizon
    pub samples_expired_total: AtomicU64,
    /// Days folded into a daily average
    pub compactions_total: AtomicU64,
    /// Raw samples replaced by compaction
    pub samples_compacted_total: AtomicU64,
    /// Unix seconds of the last completed cycle
    pub last_cycle_timestamp: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a completed cycle into the counters
    pub fn record_cycle(&self, report: &CycleReport) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        self.record_steps(report.rate_refreshed, report.ingested.is_some());

        self.samples_expired_total
            .fetch_add(report.expired, Ordering::Relaxed);

        if let CompactionOutcome::Compacted { replaced, .. } = report.compaction {
            self.compactions_total.fetch_add(1, Ordering::Relaxed);
            self.samples_compacted_total
                .fetch_add(replaced, Ordering::Relaxed);
        }

        self.last_cycle_timestamp
            .store(report.now.timestamp().max(0) as u64, Ordering::Relaxed);
    }

    /// Count a failed cycle along with the steps that ran before it failed
    pub fn record_failed_cycle(&self, err: &CycleError) {
        self.cycle_failures_total.fetch_add(1, Ordering::Relaxed);
        self.record_steps(err.rate_refreshed, err.ingested.is_some());
    }

    fn record_steps(&self, rate_refreshed: bool, ingested: bool) {
        if !rate_refreshed {
            self.rate_refresh_failures_total.fetch_add(1, Ordering::Relaxed);
        }

        if ingested {
            self.samples_ingested_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ingest_skipped_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            cycle_failures_total: self.cycle_failures_total.load(Ordering::Relaxed),
            rate_refresh_failures_total: self.rate_refresh_failures_total.load(Ordering::Relaxed),
            samples_ingested_total: self.samples_ingested_total.load(Ordering::Relaxed),
            ingest_skipped_total: self.ingest_skipped_total.load(Ordering::Relaxed),
            samples_expired_total: self.samples_expired_total.load(Ordering::Relaxed),
            compactions_total: self.compactions_total.load(Ordering::Relaxed),
            samples_compacted_total: self.samples_compacted_total.load(Ordering::Relaxed),
            last_cycle_timestamp: self.last_cycle_timestamp.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles_total: u64,
    pub cycle_failures_total: u64,
    pub rate_refresh_failures_total: u64,
    pub samples_ingested_total: u64,
    pub ingest_skipped_total: u64,
    pub samples_expired_total: u64,
    pub compactions_total: u64,
    pub samples_compacted_total: u64,
    pub last_cycle_timestamp: u64,
}

/// GET /metrics
///
/// Returns Prometheus-format metrics
pub async fn prometheus_metrics(
    axum::extract::State(state): axum::extract::State<crate::state::AppState>,
) -> impl IntoResponse {
    let snapshot = state.metrics.get_metrics();

    let output = format!(
        r#"# HELP goldvault_cycles_total Total number of completed tracker cycles
# TYPE goldvault_cycles_total counter
goldvault_cycles_total {}

# HELP goldvault_cycle_failures_total Total number of cycles aborted during expiry or compaction
# TYPE goldvault_cycle_failures_total counter
goldvault_cycle_failures_total {}

# HELP goldvault_rate_refresh_failures_total Total number of failed exchange rate refreshes
# TYPE goldvault_rate_refresh_failures_total counter
goldvault_rate_refresh_failures_total {}

# HELP goldvault_samples_ingested_total Total number of gold samples stored
# TYPE goldvault_samples_ingested_total counter
goldvault_samples_ingested_total {}

# HELP goldvault_ingest_skipped_total Total number of cycles without a new sample
# TYPE goldvault_ingest_skipped_total counter
goldvault_ingest_skipped_total {}

# HELP goldvault_samples_expired_total Total number of samples removed by retention
# TYPE goldvault_samples_expired_total counter
goldvault_samples_expired_total {}

# HELP goldvault_compactions_total Total number of days compacted into a daily average
# TYPE goldvault_compactions_total counter
goldvault_compactions_total {}

# HELP goldvault_samples_compacted_total Total number of raw samples replaced by daily averages
# TYPE goldvault_samples_compacted_total counter
goldvault_samples_compacted_total {}

# HELP goldvault_last_cycle_timestamp_seconds Unix time of the last completed cycle
# TYPE goldvault_last_cycle_timestamp_seconds gauge
goldvault_last_cycle_timestamp_seconds {}

# HELP goldvault_info Build information
# TYPE goldvault_info gauge
goldvault_info{{version="{}"}} 1
"#,
        snapshot.cycles_total,
        snapshot.cycle_failures_total,
        snapshot.rate_refresh_failures_total,
        snapshot.samples_ingested_total,
        snapshot.ingest_skipped_total,
        snapshot.samples_expired_total,
        snapshot.compactions_total,
        snapshot.samples_compacted_total,
        snapshot.last_cycle_timestamp,
        env!("CARGO_PKG_VERSION"),
    );

    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
