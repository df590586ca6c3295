//! Monotonic `now_ms`, wall-clock timestamps, and UTC day bucketing (§2 Clock & Time).

use chrono::{DateTime, NaiveDate, Utc};
use std::time::Instant;

/// A monotonic-clock reading source, used for cache/rate-limit freshness math, and a
/// wall-clock source, used for user-facing timestamps.
///
/// The default implementation wraps `std::time::Instant`/`chrono::Utc`; tests that
/// need deterministic time should construct a `Clock` from an explicit epoch and
/// advance it manually rather than reimplementing this trait, since `Instant` has
/// no portable way to be faked.
#[derive(Debug, Clone)]
pub struct Clock {
    epoch: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Create a clock anchored to the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Monotonic milliseconds elapsed since this clock was constructed. Used as the
    /// `fetchedAt`/`rateLimitedUntil` timebase throughout the Market Data Resolution
    /// & Caching Layer.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    /// Current wall-clock UTC timestamp.
    #[must_use]
    pub fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// The current UTC calendar date, used for billing-period bucketing.
    #[must_use]
    pub fn today_utc(&self) -> NaiveDate {
        self.now_utc().date_naive()
    }
}
