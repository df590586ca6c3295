//! Copilot orchestrates market data resolution, caching, and LLM invocation
//! for a portfolio assistant backend.
//!
//! Overview
//! - Resolves a canonical ticker to a live quote by scoring candidate external
//!   symbols (directory entries, a prior mapping, syntactic variants, and
//!   free-text search results) and walking them against the chart provider.
//! - Fronts every provider call with a TTL-bounded cache and single-flight
//!   deduplication so concurrent identical requests share one fetch.
//! - Falls back from the primary chart provider to a CSV bar provider to an
//!   LLM oracle, in that order, when rate-limited or empty-handed.
//! - Invokes LLM providers (chat completion and schema-constrained structured
//!   extraction) through the same cache/single-flight/quota machinery.
//! - Enforces per-tier usage quotas through an external, transactional
//!   `UsageStore` this crate only calls through, never implements.
//!
//! Key behaviors and trade-offs
//! - Symbol resolution: directory entries (score 100) beat a previously
//!   successful mapping (80), which beats syntactic variants (40), which beat
//!   free-text search hits (60 minus rank, with bonuses for a matching
//!   expected or directory name). A rate limit from the chart provider stops
//!   the walk immediately rather than exhausting the candidate list.
//! - Quote Service: cache hit, then single-flight-guarded resolver, then CSV,
//!   then (only if preferred or the resolver was rate-limited) the LLM oracle.
//! - Price Details: an ordered historical fallback chain (intraday series,
//!   daily series, CSV, oracle, a range selected by how far back the request
//!   reaches) with the current price as the final fallback.
//! - Quote Batch: per-symbol concurrent fetch with a stale-cache fallback for
//!   any symbol whose fresh fetch fails, so one bad symbol never sinks a batch
//!   that already has a usable (if aged) answer for it.
#![warn(missing_docs)]

pub(crate) mod core;
mod batch;
mod history;
pub mod llm;
mod price_details;
mod quote_service;
mod resolver;

pub use batch::{BatchFailure, QuoteBatchMeta, QuoteBatchResult};
pub use core::{ConfigTierLimits, Copilot, CopilotBuilder};
pub use llm::InvokeOutcome;
pub use price_details::PriceDetails;
pub use quote_service::GetQuoteOptions;

pub use copilot_core::{
    Clock, CopilotError, CurrentUser, HttpFetcher, RateLimitGate, TierLimits, UsageStore,
};
pub use copilot_types::{
    AssetKind, CandidateSymbol, CopilotConfig, DailyPoint, DailySeries, DirectoryEntry,
    InvokeRequest, LlmCacheKey, LlmConfig, LlmProviderTag, PrimaryChartConfig, QuotaDefaultsConfig,
    QuotaLimits, QuoteEntry, QuoteMeta, QuoteSource, Series, SeriesPoint, Tier, UsageCounter,
    UsageDelta, known_symbols, normalise,
};
