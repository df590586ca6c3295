//! The Symbol Search Provider (§4.7): a best-effort text search against the
//! public search endpoint, cached for ~10 minutes and gated by the same
//! rate-limit cooldown the chart provider trips.

use std::sync::Arc;

use copilot_core::{Clock, CopilotError, FetchOptions, HttpFetcher, RateLimitGate};
use copilot_middleware::TtlLruCache;
use copilot_types::CandidateSymbol;

/// Config for the symbol search provider.
#[derive(Debug, Clone)]
pub struct SymbolSearchConfig {
    /// Base URL for the search endpoint.
    pub base_url: String,
    /// Cache freshness window.
    pub cache_ttl_ms: i64,
    /// Cache capacity.
    pub cache_max_entries: usize,
    /// Maximum results requested/kept per query.
    pub max_results: usize,
    /// Per-request deadline.
    pub request_timeout_ms: u64,
}

impl Default for SymbolSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.example/v1/finance/search".to_string(),
            cache_ttl_ms: 10 * 60 * 1000,
            cache_max_entries: 200,
            max_results: 8,
            request_timeout_ms: 10_000,
        }
    }
}

/// Looks up candidate symbols for a free-text query. Errors are logged and
/// downgraded to an empty result — search is best-effort (§4.7).
pub struct SymbolSearchProvider {
    fetcher: Arc<dyn HttpFetcher>,
    rate_limit: Arc<RateLimitGate>,
    clock: Clock,
    cache: TtlLruCache<String, Vec<CandidateSymbol>>,
    config: SymbolSearchConfig,
}

impl SymbolSearchProvider {
    /// Build a provider sharing the given rate-limit gate with other primary
    /// providers (§4.7: "respects the shared `rateLimitedUntil` flag").
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        rate_limit: Arc<RateLimitGate>,
        clock: Clock,
        config: SymbolSearchConfig,
    ) -> Self {
        let cache = TtlLruCache::new(config.cache_max_entries);
        Self {
            fetcher,
            rate_limit,
            clock,
            cache,
            config,
        }
    }

    /// Search for `query`, returning up to `max_results` normalised candidates.
    /// Never errors outward: failures are swallowed and logged, yielding `[]`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn search(&self, query: &str) -> Vec<CandidateSymbol> {
        let now_ms = self.clock.now_ms();
        if let Some(hit) = self.cache.get_fresh(&query.to_string(), now_ms, self.config.cache_ttl_ms) {
            return hit;
        }
        if self.rate_limit.is_limited(now_ms) {
            #[cfg(feature = "tracing")]
            tracing::warn!(query, "symbol search skipped: provider rate-limited");
            return Vec::new();
        }

        match self.fetch_and_normalise(query).await {
            Ok(candidates) => {
                self.cache.put(query.to_string(), candidates.clone(), now_ms);
                candidates
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(query, error = %_err, "symbol search failed, downgrading to empty result");
                Vec::new()
            }
        }
    }

    async fn fetch_and_normalise(&self, query: &str) -> Result<Vec<CandidateSymbol>, CopilotError> {
        let url = format!("{}?q={}", self.config.base_url, urlencode(query));
        let opts = FetchOptions {
            headers: Vec::new(),
            deadline_ms: Some(self.config.request_timeout_ms),
        };
        let body = self.fetcher.fetch_json(&url, opts).await?;

        let raw_quotes = body
            .get("quotes")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let candidates = raw_quotes
            .into_iter()
            .filter_map(|q| {
                let symbol = q.get("symbol").and_then(|v| v.as_str())?.to_ascii_uppercase();
                Some(CandidateSymbol {
                    symbol,
                    name: q
                        .get("shortname")
                        .or_else(|| q.get("longname"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    exchange: q
                        .get("exchange")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                })
            })
            .take(self.config.max_results)
            .collect();

        Ok(candidates)
    }
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedFetcher(serde_json::Value);

    #[async_trait]
    impl HttpFetcher for FixedFetcher {
        async fn fetch_json(
            &self,
            _url: &str,
            _opts: FetchOptions,
        ) -> Result<serde_json::Value, CopilotError> {
            Ok(self.0.clone())
        }
        async fn fetch_text(&self, _url: &str, _opts: FetchOptions) -> Result<String, CopilotError> {
            unimplemented!()
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl HttpFetcher for FailingFetcher {
        async fn fetch_json(
            &self,
            _url: &str,
            _opts: FetchOptions,
        ) -> Result<serde_json::Value, CopilotError> {
            Err(CopilotError::provider_error("search", "boom"))
        }
        async fn fetch_text(&self, _url: &str, _opts: FetchOptions) -> Result<String, CopilotError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn normalises_results_to_upper_symbol_name_exchange() {
        let body = json!({"quotes": [
            {"symbol": "aapl", "shortname": "Apple Inc.", "exchange": "NMS"},
        ]});
        let provider = SymbolSearchProvider::new(
            Arc::new(FixedFetcher(body)),
            Arc::new(RateLimitGate::new()),
            Clock::new(),
            SymbolSearchConfig::default(),
        );
        let results = provider.search("apple").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "AAPL");
        assert_eq!(results[0].name.as_deref(), Some("Apple Inc."));
    }

    #[tokio::test]
    async fn provider_failure_downgrades_to_empty_result() {
        let provider = SymbolSearchProvider::new(
            Arc::new(FailingFetcher),
            Arc::new(RateLimitGate::new()),
            Clock::new(),
            SymbolSearchConfig::default(),
        );
        let results = provider.search("whatever").await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn a_shared_rate_limit_short_circuits_the_fetch() {
        let gate = Arc::new(RateLimitGate::new());
        gate.set_until(i64::MAX / 2);
        let provider = SymbolSearchProvider::new(
            Arc::new(FailingFetcher),
            gate,
            Clock::new(),
            SymbolSearchConfig::default(),
        );
        let results = provider.search("anything").await;
        assert!(results.is_empty());
    }
}
