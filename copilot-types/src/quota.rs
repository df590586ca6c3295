//! Per-user quota types consumed by the Quota Gate (§4.15, §10.3).
//!
//! The core treats the usage counter as an opaque transactional resource owned by an
//! external collaborator (a relational/document store, out of scope per §1); this
//! module only defines the shapes that cross that boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier, used to look up [`QuotaLimits`] via `TierLimits::limits_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Unpaid tier; the tightest limits.
    Free,
    /// Paid tier.
    Pro,
    /// Highest paid tier.
    Team,
}

/// Monthly allowances for a [`Tier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Maximum LLM invocations (`invoke_llm` + `extract_structured`) per period.
    pub insights: u64,
    /// Maximum price lookups (`get_quote`/`get_quote_batch`/`get_price_details`) per period.
    pub quotes: u64,
    /// Maximum document uploads per period.
    pub uploads: u64,
}

/// The external usage counter: `{userId, periodStart, periodEnd, llmCalls, priceRequests, uploads}` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Start of the current UTC billing month.
    pub period_start: DateTime<Utc>,
    /// End of the current UTC billing month.
    pub period_end: DateTime<Utc>,
    /// LLM invocations consumed so far this period.
    pub llm_calls: u64,
    /// Price lookups consumed so far this period.
    pub price_requests: u64,
    /// Uploads consumed so far this period.
    pub uploads: u64,
}

impl UsageCounter {
    /// True if adding `delta` to the current counters would stay within `limits`.
    #[must_use]
    pub const fn fits_within(&self, limits: QuotaLimits, delta: UsageDelta) -> bool {
        self.llm_calls + delta.insight_delta <= limits.insights
            && self.price_requests + delta.quote_delta <= limits.quotes
            && self.uploads + delta.upload_delta <= limits.uploads
    }
}

/// The quantity to add to each counter on a single `consume` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDelta {
    /// LLM invocations to add.
    pub insight_delta: u64,
    /// Price lookups to add.
    pub quote_delta: u64,
    /// Uploads to add.
    pub upload_delta: u64,
}

impl UsageDelta {
    /// A delta for a single `invoke_llm`/`extract_structured` call.
    #[must_use]
    pub const fn insight(n: u64) -> Self {
        Self {
            insight_delta: n,
            quote_delta: 0,
            upload_delta: 0,
        }
    }

    /// A delta for `n` price lookups (a batch of `n` symbols, or one `get_price_details` call).
    #[must_use]
    pub const fn quotes(n: u64) -> Self {
        Self {
            insight_delta: 0,
            quote_delta: n,
            upload_delta: 0,
        }
    }
}
