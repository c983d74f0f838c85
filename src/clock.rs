//! Wall-clock sources for the scheduler

use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

/// Source of the `now` handed to each cycle
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to `origin` that advances with tokio time.
///
/// Under a paused runtime (`tokio::time::pause`) it moves only when virtual
/// time is advanced, which makes multi-day schedules replayable in tests.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    origin: DateTime<Utc>,
    started: Instant,
}

impl AnchoredClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.started.elapsed()).unwrap_or(Duration::zero());
        self.origin + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn test_anchored_clock_follows_virtual_time() {
        let origin = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap();
        let clock = AnchoredClock::new(origin);
        assert_eq!(clock.now(), origin);

        tokio::time::advance(std::time::Duration::from_secs(120)).await;
        assert_eq!(clock.now(), origin + Duration::minutes(2));
    }
}
