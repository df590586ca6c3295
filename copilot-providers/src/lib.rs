//! Concrete market-data and LLM providers for the Market Data Resolution &
//! Caching Layer (§4) and the LLM Invocation Layer (§4.11): a reqwest-backed
//! [`HttpFetcher`](copilot_core::HttpFetcher), the primary chart, symbol search,
//! and CSV daily-bar providers, the OpenAI/OpenRouter LLM clients, the
//! strict-then-loose JSON repair they share, and the LLM Oracle that falls back
//! to asking a model for a price when nothing else has one.
#![warn(missing_docs)]

/// A `reqwest`-backed [`HttpFetcher`](copilot_core::HttpFetcher) for the GET-only
/// market-data providers.
pub mod http_fetcher;
/// Strict-then-loose JSON recovery shared by the LLM client and the oracle.
pub mod json_repair;
/// HTTP clients for the OpenAI-style and OpenRouter-style LLM backends.
pub mod llm_client;
/// The LLM Oracle: a last-resort price source.
pub mod oracle;
/// The public chart/quote endpoint (live quotes and ranged history).
pub mod primary_chart;
/// A CSV-backed secondary source of daily close bars.
pub mod csv_bars;
/// A best-effort symbol search endpoint, cached and rate-limit aware.
pub mod symbol_search;

pub use csv_bars::{CsvDailyBarConfig, CsvDailyBarProvider};
pub use http_fetcher::ReqwestHttpFetcher;
pub use json_repair::parse_loose;
pub use llm_client::{ChatMessage, LlmProvider, OpenAiProvider, OpenRouterProvider};
pub use oracle::{LlmOracleProvider, OraclePrice};
pub use primary_chart::{ChartMeta, ChartResult, PrimaryChartEndpointConfig, PrimaryChartProvider};
pub use symbol_search::{SymbolSearchConfig, SymbolSearchProvider};
