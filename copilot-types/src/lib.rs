//! Data transfer objects and configuration primitives shared across the portfolio
//! copilot backend: the canonical ticker/quote/series types of the Market Data
//! Resolution & Caching Layer, the cache entry wrapper every TTL-LRU cache stores,
//! the LLM invocation cache key, and the typed, environment-sourced configuration
//! aggregate described in the specification's ambient stack.
#![warn(missing_docs)]

pub mod cache_entry;
pub mod config;
pub mod llm;
pub mod quota;
pub mod quote;
pub mod series;
pub mod ticker;

pub use cache_entry::CacheEntry;
pub use config::{CacheConfig, CopilotConfig, LlmConfig, PrimaryChartConfig, QuotaDefaultsConfig};
pub use llm::{InvokeRequest, LlmCacheKey, LlmProviderTag};
pub use quota::{QuotaLimits, Tier, UsageCounter, UsageDelta};
pub use quote::{CandidateSymbol, QuoteEntry, QuoteMeta, QuoteSource};
pub use series::{
    DAILY_BAR_IMPUTED_HOUR_UTC, DailyPoint, DailySeries, Series, SeriesPoint, find_closest,
    impute_daily_timestamp,
};
pub use ticker::{AssetKind, DirectoryEntry, known_symbols, lookup, normalise, syntactic_variants};
