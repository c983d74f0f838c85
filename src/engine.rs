//! Retention and compaction engine
//!
//! One call to [`RetentionEngine::run_cycle`] performs, in order:
//! rate refresh, ingestion, expiry of old samples, and compaction of
//! yesterday's samples into a single daily average. The first two steps are
//! best-effort; store failures in the last two fail the cycle.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::conversion::to_gram_price;
use crate::error::{AppError, Result};
use crate::models::{DailyAverage, RetentionPolicy, Sample, TimeRange};
use crate::services::price_source::PriceSource;
use crate::services::rate_source::RateSource;
use crate::store::SampleStore;

/// Rate used until the first successful refresh
pub const FALLBACK_RATE: f64 = 0.308;

/// Spread added on top of every fetched rate
pub const RATE_MARGIN: f64 = 0.002;

/// Last known good conversion rate. Overwritten in place, never reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionRate {
    pub value: f64,
}

impl Default for ConversionRate {
    fn default() -> Self {
        Self {
            value: FALLBACK_RATE,
        }
    }
}

/// What compaction did for the inspected day
#[derive(Debug, Clone, PartialEq)]
pub enum CompactionOutcome {
    /// The day held more samples than the threshold and was folded into one
    Compacted {
        day_start: DateTime<Utc>,
        replaced: u64,
        average: DailyAverage,
    },
    /// Not enough samples; left untouched for the next cycle
    Skipped { count: usize },
}

/// Summary of one cycle, used for logging and metrics
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub now: DateTime<Utc>,
    pub rate_refreshed: bool,
    /// Rate in effect after the refresh step
    pub rate: f64,
    pub ingested: Option<Sample>,
    pub expired: u64,
    pub compaction: CompactionOutcome,
}

/// A cycle whose expiry or compaction step failed.
///
/// Carries what the best-effort steps did before the failure so callers can
/// still account for them.
#[derive(Debug, Error)]
#[error("cycle at {now} failed: {source}")]
pub struct CycleError {
    pub now: DateTime<Utc>,
    pub rate_refreshed: bool,
    pub ingested: Option<Sample>,
    #[source]
    pub source: AppError,
}

/// Start of the calendar day containing `now`, with days delimited by `offset`.
pub fn day_start(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local_midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_time(NaiveTime::default());
    (local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

/// `[start_of_yesterday, start_of_today)` relative to `now`
pub fn yesterday_window(now: DateTime<Utc>, offset: FixedOffset) -> TimeRange {
    let today = day_start(now, offset);
    TimeRange::between(today - Duration::days(1), today)
}

/// Drives ingestion, expiry and compaction against a [`SampleStore`].
///
/// Owns the conversion rate cache; cycles take `&mut self`, so two cycles on
/// the same engine can never overlap.
pub struct RetentionEngine {
    store: Arc<dyn SampleStore>,
    rate_source: Arc<dyn RateSource>,
    price_source: Arc<dyn PriceSource>,
    policy: RetentionPolicy,
    rate: ConversionRate,
    rate_margin: f64,
}

impl RetentionEngine {
    pub fn new(
        store: Arc<dyn SampleStore>,
        rate_source: Arc<dyn RateSource>,
        price_source: Arc<dyn PriceSource>,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            store,
            rate_source,
            price_source,
            policy,
            rate: ConversionRate::default(),
            rate_margin: RATE_MARGIN,
        }
    }

    /// Override the rate used before the first successful refresh
    pub fn with_initial_rate(mut self, value: f64) -> Self {
        self.rate = ConversionRate { value };
        self
    }

    pub fn with_rate_margin(mut self, margin: f64) -> Self {
        self.rate_margin = margin;
        self
    }

    /// Rate currently in effect
    pub fn current_rate(&self) -> f64 {
        self.rate.value
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Run one full cycle at `now`.
    ///
    /// Rate and price failures are logged and swallowed. A failure during
    /// expiry or compaction is returned as a [`CycleError`]; the caller logs
    /// it and the next cycle starts fresh.
    pub async fn run_cycle(
        &mut self,
        now: DateTime<Utc>,
    ) -> std::result::Result<CycleReport, CycleError> {
        let rate_refreshed = match self.refresh_rate().await {
            Ok(rate) => {
                info!(rate = rate, "Updated USD->KWD rate");
                true
            }
            Err(e) => {
                warn!(error = %e, rate = self.rate.value, "Rate refresh failed, keeping last known rate");
                false
            }
        };

        let ingested = match self.ingest(now).await {
            Ok(sample) => {
                info!(
                    ounce_price = sample.raw_price,
                    gram_price = sample.derived_value,
                    "Stored gold sample"
                );
                Some(sample)
            }
            Err(e @ AppError::Store(_)) => {
                error!(error = %e, "Failed to store gold sample");
                None
            }
            Err(e) => {
                warn!(error = %e, "Skipping ingestion this cycle");
                None
            }
        };

        let (expired, compaction) = match self.clean_up(now).await {
            Ok(done) => done,
            Err(source) => {
                return Err(CycleError {
                    now,
                    rate_refreshed,
                    ingested,
                    source,
                })
            }
        };

        Ok(CycleReport {
            now,
            rate_refreshed,
            rate: self.rate.value,
            ingested,
            expired,
            compaction,
        })
    }

    async fn refresh_rate(&mut self) -> Result<f64> {
        let fetched = self.rate_source.fetch_rate().await?;
        let value = fetched + self.rate_margin;
        if !value.is_finite() || value <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "rate {} with margin {} is not a usable rate",
                fetched, self.rate_margin
            )));
        }
        self.rate.value = value;
        Ok(value)
    }

    async fn ingest(&self, now: DateTime<Utc>) -> Result<Sample> {
        let raw_price = self.price_source.fetch_price().await?;
        let derived_value = to_gram_price(raw_price, self.rate.value)?;

        let sample = Sample::new(now, raw_price, derived_value);
        self.store.insert(&sample).await?;
        Ok(sample)
    }

    async fn clean_up(&self, now: DateTime<Utc>) -> Result<(u64, CompactionOutcome)> {
        let expired = self.expire(now).await?;
        let compaction = self.compact(now).await?;
        Ok((expired, compaction))
    }

    /// Delete every sample strictly older than `now - max_age`
    async fn expire(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now.checked_sub_signed(self.policy.max_age).ok_or_else(|| {
            AppError::Config(format!(
                "retention of {} days reaches before the earliest representable time",
                self.policy.max_age.num_days()
            ))
        })?;
        let deleted = self.store.delete_range(TimeRange::before(cutoff)).await?;

        if deleted > 0 {
            info!(deleted = deleted, cutoff = %cutoff, "Expired old samples");
        }
        Ok(deleted)
    }

    /// Fold yesterday's samples into one mean-valued sample once there are enough
    async fn compact(&self, now: DateTime<Utc>) -> Result<CompactionOutcome> {
        let window = yesterday_window(now, self.policy.utc_offset);
        let samples = self.store.find_range(window).await?;
        let count = samples.len();

        if count <= self.policy.compaction_threshold {
            debug!(count = count, "Not enough samples to compact yesterday");
            return Ok(CompactionOutcome::Skipped { count });
        }

        let Some(average) = DailyAverage::from_samples(&samples) else {
            return Ok(CompactionOutcome::Skipped { count });
        };

        // Window start is always set for a day window.
        let day_start = window.start.unwrap_or(window.end - Duration::days(1));
        let summary = Sample::new(day_start, average.raw_price, average.derived_value);
        let replaced = self.store.replace_range(window, &summary).await?;

        info!(
            count = count,
            replaced = replaced,
            day = %day_start.date_naive(),
            gram_price = average.derived_value,
            "Compacted yesterday's samples into daily average"
        );

        Ok(CompactionOutcome::Compacted {
            day_start,
            replaced,
            average,
        })
    }
}
