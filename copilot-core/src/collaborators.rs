//! External collaborator traits (§10.3).
//!
//! Persistence, authentication, and HTTP routing are explicit Non-goals (§1); the
//! core depends on them only through these narrow traits so it can be exercised
//! and tested without a database, session store, or web framework. This mirrors
//! the role-trait pattern used throughout this codebase's provider layer: narrow,
//! independently mockable capability traits rather than one monolithic interface.

use async_trait::async_trait;
use copilot_types::{Tier, UsageCounter, UsageDelta};

use crate::error::CopilotError;

/// The authenticated caller a request is made on behalf of.
pub trait CurrentUser: Send + Sync {
    /// Stable user identifier, used as the key into the `UsageStore`.
    fn user_id(&self) -> &str;
    /// The caller's subscription tier, used to look up `QuotaLimits`.
    fn tier(&self) -> Tier;
}

/// The external, transactional usage-counter store (§3, §4.15).
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Read the current period's counters for `user`.
    async fn read(&self, user: &str) -> Result<UsageCounter, CopilotError>;

    /// Pre-check: would consuming `delta` keep the user within their tier's limits?
    /// Does not mutate state; callers still must call `consume` to actually record
    /// the usage once the underlying work has succeeded.
    async fn assert_within_quota(
        &self,
        user: &dyn CurrentUser,
        limits: QuotaLimitsRef,
        delta: UsageDelta,
    ) -> Result<(), CopilotError>;

    /// Transactionally add `delta` to the user's counters and return the updated
    /// totals. Never decreases counters; concurrent calls never admit past the
    /// limit passed to the prior `assert_within_quota` (§8 Quota monotonicity).
    async fn consume(
        &self,
        user: &dyn CurrentUser,
        delta: UsageDelta,
    ) -> Result<UsageCounter, CopilotError>;
}

/// A type alias making the limits parameter to `assert_within_quota` self-documenting;
/// kept as a distinct name because call sites read `limits.insights` etc. directly.
pub type QuotaLimitsRef = copilot_types::QuotaLimits;

/// Maps a subscription tier to its monthly allowances.
pub trait TierLimits: Send + Sync {
    /// The limits in effect for `tier`.
    fn limits_for(&self, tier: Tier) -> copilot_types::QuotaLimits;
}

/// Per-call options for an [`HttpFetcher`] request.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Extra headers to send with the request.
    pub headers: Vec<(String, String)>,
    /// Deadline in milliseconds; `None` means no explicit deadline is applied by
    /// the fetcher itself (a caller-supplied `reqwest::Client` timeout may still apply).
    pub deadline_ms: Option<u64>,
}

/// Parameterised HTTP GET with a per-call deadline and JSON/text decoding (§4.3).
///
/// Deadlines abort the in-flight request and surface as `CopilotError::Timeout`
/// with status 504. HTTP 429 surfaces as `CopilotError::RateLimit`. Other 4xx/5xx
/// surface as `CopilotError::ProviderError` carrying the numeric status and a
/// size-capped raw body. No automatic retry — retry policy is the caller's concern.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetch `url` and decode the body as JSON.
    async fn fetch_json(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<serde_json::Value, CopilotError>;

    /// Fetch `url` and return the body as text.
    async fn fetch_text(&self, url: &str, opts: FetchOptions) -> Result<String, CopilotError>;
}
