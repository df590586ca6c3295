//! In-memory [`UsageStore`], [`TierLimits`], and [`CurrentUser`] doubles.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use copilot_core::{CopilotError, CurrentUser, TierLimits, UsageStore};
use copilot_types::{QuotaLimits, Tier, UsageCounter, UsageDelta};

/// A fixed `user_id`/`tier` pair, the simplest possible [`CurrentUser`].
#[derive(Debug, Clone)]
pub struct StaticUser {
    id: String,
    tier: Tier,
}

impl StaticUser {
    /// Build a user with the given id and tier.
    #[must_use]
    pub fn new(id: impl Into<String>, tier: Tier) -> Self {
        Self { id: id.into(), tier }
    }
}

impl CurrentUser for StaticUser {
    fn user_id(&self) -> &str {
        &self.id
    }
    fn tier(&self) -> Tier {
        self.tier
    }
}

/// A [`TierLimits`] that returns the same [`QuotaLimits`] regardless of tier,
/// for tests that only care about one tier's boundary behaviour.
#[derive(Debug, Clone, Copy)]
pub struct FixedTierLimits(pub QuotaLimits);

impl TierLimits for FixedTierLimits {
    fn limits_for(&self, _tier: Tier) -> QuotaLimits {
        self.0
    }
}

/// An in-process [`UsageStore`] keyed by user id, with a month-long billing
/// period starting at construction time. `assert_within_quota` and `consume`
/// are each guarded by the same mutex, so concurrent callers against one user
/// never jointly admit past the checked limit (§8 Quota monotonicity).
pub struct InMemoryUsageStore {
    counters: Mutex<HashMap<String, UsageCounter>>,
}

impl Default for InMemoryUsageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUsageStore {
    /// Build an empty store; each new user starts at zero usage for a
    /// thirty-day period beginning now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Seed `user` with a specific starting counter, overriding the default
    /// zeroed thirty-day period.
    pub fn seed(&self, user: &str, counter: UsageCounter) {
        self.counters.lock().unwrap().insert(user.to_string(), counter);
    }

    fn entry_for(counters: &mut HashMap<String, UsageCounter>, user: &str) -> UsageCounter {
        *counters.entry(user.to_string()).or_insert_with(|| {
            let now = Utc::now();
            UsageCounter {
                period_start: now,
                period_end: now + Duration::days(30),
                llm_calls: 0,
                price_requests: 0,
                uploads: 0,
            }
        })
    }
}

fn quota_exceeded(current: &UsageCounter, limits: QuotaLimits, delta: UsageDelta) -> CopilotError {
    let remaining = if delta.insight_delta > 0 {
        limits.insights.saturating_sub(current.llm_calls)
    } else if delta.quote_delta > 0 {
        limits.quotes.saturating_sub(current.price_requests)
    } else {
        limits.uploads.saturating_sub(current.uploads)
    };
    let reset_in_ms = (current.period_end - Utc::now()).num_milliseconds().max(0) as u64;
    CopilotError::QuotaExceeded {
        remaining,
        reset_in_ms,
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn read(&self, user: &str) -> Result<UsageCounter, CopilotError> {
        let mut counters = self.counters.lock().unwrap();
        Ok(Self::entry_for(&mut counters, user))
    }

    async fn assert_within_quota(
        &self,
        user: &dyn CurrentUser,
        limits: QuotaLimits,
        delta: UsageDelta,
    ) -> Result<(), CopilotError> {
        let mut counters = self.counters.lock().unwrap();
        let current = Self::entry_for(&mut counters, user.user_id());
        if current.fits_within(limits, delta) {
            Ok(())
        } else {
            Err(quota_exceeded(&current, limits, delta))
        }
    }

    async fn consume(
        &self,
        user: &dyn CurrentUser,
        delta: UsageDelta,
    ) -> Result<UsageCounter, CopilotError> {
        let mut counters = self.counters.lock().unwrap();
        let current = Self::entry_for(&mut counters, user.user_id());
        let updated = UsageCounter {
            llm_calls: current.llm_calls + delta.insight_delta,
            price_requests: current.price_requests + delta.quote_delta,
            uploads: current.uploads + delta.upload_delta,
            ..current
        };
        counters.insert(user.user_id().to_string(), updated);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unseen_users_start_at_zero_and_accumulate() {
        let store = InMemoryUsageStore::new();
        let user = StaticUser::new("u1", Tier::Free);
        let limits = QuotaLimits {
            insights: 5,
            quotes: 5,
            uploads: 5,
        };
        store
            .assert_within_quota(&user, limits, UsageDelta::insight(1))
            .await
            .unwrap();
        let updated = store.consume(&user, UsageDelta::insight(1)).await.unwrap();
        assert_eq!(updated.llm_calls, 1);
    }

    #[tokio::test]
    async fn rejects_once_the_limit_is_reached() {
        let store = InMemoryUsageStore::new();
        let user = StaticUser::new("u1", Tier::Free);
        let limits = QuotaLimits {
            insights: 1,
            quotes: 5,
            uploads: 5,
        };
        store.consume(&user, UsageDelta::insight(1)).await.unwrap();
        let err = store
            .assert_within_quota(&user, limits, UsageDelta::insight(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CopilotError::QuotaExceeded { remaining: 0, .. }));
    }
}
