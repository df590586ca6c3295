//! The Quota Gate: pre-check then transactional consume against the external
//! `UsageStore`, keyed by the caller's tier-derived `QuotaLimits` (§4.15).

use std::sync::Arc;

use chrono::Utc;
use copilot_core::{CopilotError, CurrentUser, TierLimits, UsageStore};
use copilot_types::{UsageCounter, UsageDelta};

/// Enforces per-user monthly allowances before admitting quota-consuming work.
///
/// `check_and_consume` is not atomic across the two external calls it makes
/// (`assert_within_quota` then `consume`) — the external `UsageStore` is
/// responsible for the transactional guarantee that concurrent `consume` calls
/// never jointly admit past the limit checked at pre-check time (§8 Quota
/// monotonicity); this gate only sequences the two calls and translates a
/// failed pre-check into `CopilotError::QuotaExceeded`.
pub struct QuotaGate {
    usage_store: Arc<dyn UsageStore>,
    tier_limits: Arc<dyn TierLimits>,
}

impl QuotaGate {
    /// Build a gate over the given collaborators.
    #[must_use]
    pub fn new(usage_store: Arc<dyn UsageStore>, tier_limits: Arc<dyn TierLimits>) -> Self {
        Self {
            usage_store,
            tier_limits,
        }
    }

    /// Pre-check `delta` against `user`'s tier limits, returning
    /// `CopilotError::QuotaExceeded` if it would not fit; callers only reach
    /// `consume` once the gated work has actually succeeded. Delegates to the
    /// store's own `assert_within_quota` rather than reading and comparing
    /// locally, since the store is the one positioned to make the check
    /// race-free against concurrent `consume` calls.
    pub async fn check(
        &self,
        user: &dyn CurrentUser,
        delta: UsageDelta,
    ) -> Result<(), CopilotError> {
        let limits = self.tier_limits.limits_for(user.tier());
        self.usage_store.assert_within_quota(user, limits, delta).await
    }

    /// Pre-check then, if admitted, record `delta` against `user`'s counters.
    /// Returns the updated counters on success.
    pub async fn check_and_consume(
        &self,
        user: &dyn CurrentUser,
        delta: UsageDelta,
    ) -> Result<UsageCounter, CopilotError> {
        self.check(user, delta).await?;
        self.usage_store.consume(user, delta).await
    }

    /// Record `delta` against `user`'s counters without a preceding pre-check.
    ///
    /// For flows that already called `check` once up front and only want to
    /// book the consumption after the gated work succeeds (§4.12, §4.11):
    /// re-running `assert_within_quota` at that point would reject work that
    /// was already admitted and performed.
    pub async fn consume(
        &self,
        user: &dyn CurrentUser,
        delta: UsageDelta,
    ) -> Result<UsageCounter, CopilotError> {
        self.usage_store.consume(user, delta).await
    }
}

#[cfg(test)]
fn quota_exceeded(
    current: &UsageCounter,
    limits: copilot_types::QuotaLimits,
    delta: UsageDelta,
) -> CopilotError {
    let remaining_insights = limits.insights.saturating_sub(current.llm_calls);
    let remaining_quotes = limits.quotes.saturating_sub(current.price_requests);
    let remaining_uploads = limits.uploads.saturating_sub(current.uploads);
    let remaining = if delta.insight_delta > 0 {
        remaining_insights
    } else if delta.quote_delta > 0 {
        remaining_quotes
    } else {
        remaining_uploads
    };
    let reset_in_ms = (current.period_end - Utc::now()).num_milliseconds().max(0) as u64;
    CopilotError::QuotaExceeded {
        remaining,
        reset_in_ms,
    }
}
