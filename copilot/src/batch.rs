//! The Quote Batch Endpoint (§4.13): concurrent per-symbol resolution with
//! partial-failure reporting, mirroring the stale-fallback and quota-pre-check
//! shape of [`Copilot::get_quote`] across many symbols at once.

use std::collections::HashMap;

use copilot_core::{CopilotError, CurrentUser};
use copilot_types::{QuoteEntry, UsageDelta, normalise};
use futures::future::join_all;

use crate::core::Copilot;
use crate::quote_service::GetQuoteOptions;

/// One symbol's fetch failure, reported alongside any symbols that did succeed.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// The canonical ticker that failed to resolve.
    pub symbol: String,
    /// The error encountered.
    pub error: CopilotError,
}

/// Batch metadata accompanying [`QuoteBatchResult::data`].
#[derive(Debug, Clone, Default)]
pub struct QuoteBatchMeta {
    /// Canonical tickers served from a fresh (non-stale) cache hit.
    pub cache_hits: Vec<String>,
    /// Per-symbol failures for symbols that had no usable fallback.
    pub partial_failures: Vec<BatchFailure>,
}

/// The result of [`Copilot::get_quote_batch`].
#[derive(Debug, Clone, Default)]
pub struct QuoteBatchResult {
    /// Canonical ticker → resolved entry, for every symbol that produced one
    /// (fresh, freshly-fetched, or stale-substituted).
    pub data: HashMap<String, QuoteEntry>,
    /// Batch-level bookkeeping.
    pub meta: QuoteBatchMeta,
}

impl Copilot {
    /// Resolve quotes for every symbol in `symbols` (§4.13): normalise and
    /// deduplicate, enforce the per-request symbol cap, and fetch the
    /// remainder concurrently, falling back to a stale cache entry for any
    /// symbol whose fresh fetch fails.
    pub async fn get_quote_batch(
        &self,
        user: &dyn CurrentUser,
        symbols: &[String],
    ) -> Result<QuoteBatchResult, CopilotError> {
        let mut unique = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for raw in symbols {
            let canonical = normalise(raw);
            if seen.insert(canonical.clone()) {
                unique.push(canonical);
            }
        }
        if unique.is_empty() {
            return Err(CopilotError::Validation("symbols must not be empty".to_string()));
        }
        if let Some(max) = self.config.cache.max_symbols_per_request {
            if unique.len() > max {
                return Err(CopilotError::Validation(format!(
                    "at most {max} symbols may be requested at once, got {}",
                    unique.len()
                )));
            }
        }

        self.quota_gate
            .check(user, UsageDelta::quotes(unique.len() as u64))
            .await?;

        let ttl_ms = self.config.cache.price_ttl.as_millis() as i64;
        let now_ms = self.clock.now_ms();

        let mut data = HashMap::new();
        let mut cache_hits = Vec::new();
        let mut to_fetch = Vec::new();
        for symbol in unique {
            if let Some(fresh) = self.price_cache.get_fresh(&symbol, now_ms, ttl_ms) {
                cache_hits.push(symbol.clone());
                data.insert(symbol, fresh);
            } else {
                let stale = self.price_cache.get(&symbol).map(|entry| entry.value);
                to_fetch.push((symbol, stale));
            }
        }

        let fetches = to_fetch.into_iter().map(|(symbol, stale)| async move {
            let result = self
                .get_quote(
                    &symbol,
                    GetQuoteOptions {
                        prefer_oracle: false,
                        expected_name: None,
                    },
                )
                .await;
            (symbol, stale, result)
        });

        let mut partial_failures = Vec::new();
        for (symbol, stale, result) in join_all(fetches).await {
            match result {
                Ok(entry) => {
                    data.insert(symbol, entry);
                }
                Err(err) => {
                    if let Some(mut stale_entry) = stale {
                        stale_entry.stale = true;
                        data.insert(symbol, stale_entry);
                    } else {
                        partial_failures.push(BatchFailure { symbol, error: err });
                    }
                }
            }
        }

        if data.is_empty() {
            return match partial_failures.into_iter().next() {
                Some(failure) => Err(failure.error),
                None => Err(CopilotError::not_found("no symbols resolved in batch request")),
            };
        }

        self.quota_gate
            .consume(user, UsageDelta::quotes(data.len() as u64))
            .await?;

        Ok(QuoteBatchResult {
            data,
            meta: QuoteBatchMeta {
                cache_hits,
                partial_failures,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use copilot_mock::{InMemoryUsageStore, MockBehavior, MockHttpFetcher, StaticUser};
    use copilot_types::Tier;
    use serde_json::json;

    use super::*;

    fn build_copilot(fetcher: Arc<MockHttpFetcher>) -> Copilot {
        Copilot::builder()
            .http_fetcher(fetcher)
            .usage_store(Arc::new(InMemoryUsageStore::default()))
            .build()
            .unwrap()
    }

    fn chart_ok(symbol: &str, close: f64) -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": symbol, "currency": "USD", "exchangeName": "NMS"},
                    "timestamp": [1_700_000_000],
                    "indicators": {"quote": [{"close": [close]}]}
                }],
                "error": null
            }
        })
    }

    #[tokio::test]
    async fn an_empty_symbol_list_is_rejected() {
        let (fetcher, _ctl) = MockHttpFetcher::new_with_controller();
        let copilot = build_copilot(Arc::new(fetcher));
        let user = StaticUser::new("u1", Tier::Free);
        let err = copilot.get_quote_batch(&user, &[]).await.unwrap_err();
        assert!(matches!(err, CopilotError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_symbols_are_deduplicated_before_fetching() {
        let (fetcher, ctl) = MockHttpFetcher::new_with_controller();
        ctl.push_json("chart", MockBehavior::Return(chart_ok("AAPL", 150.0)));
        ctl.push_json("search", MockBehavior::Return(json!({"quotes": []})));
        let copilot = build_copilot(Arc::new(fetcher));
        let user = StaticUser::new("u1", Tier::Free);

        let symbols = vec!["aapl".to_string(), "AAPL".to_string(), " aapl ".to_string()];
        let result = copilot.get_quote_batch(&user, &symbols).await.unwrap();
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data["AAPL"].price, 150.0);
    }

    #[tokio::test]
    async fn a_failed_fetch_falls_back_to_a_stale_cache_entry() {
        let (fetcher, ctl) = MockHttpFetcher::new_with_controller();
        ctl.push_json("chart", MockBehavior::Return(chart_ok("AAPL", 100.0)));
        ctl.push_json("search", MockBehavior::Return(json!({"quotes": []})));
        let copilot = build_copilot(Arc::new(fetcher));
        let user = StaticUser::new("u1", Tier::Free);

        // Warm the cache, then age it out via a stale put (bypassing the TTL check).
        let first = copilot
            .get_quote_batch(&user, &["AAPL".to_string()])
            .await
            .unwrap();
        assert_eq!(first.data["AAPL"].price, 100.0);
        copilot.price_cache.put("AAPL".to_string(), first.data["AAPL"].clone(), -1_000_000);

        let not_found = json!({"chart": {"result": [], "error": {"code": "Not Found", "description": "no data"}}});
        ctl.push_json("chart", MockBehavior::Return(not_found));
        ctl.push_json("search", MockBehavior::Return(json!({"quotes": []})));
        ctl.push_text(
            "stooq",
            MockBehavior::Fail(CopilotError::provider_error("csv", "unavailable")),
        );

        let second = copilot
            .get_quote_batch(&user, &["AAPL".to_string()])
            .await
            .unwrap();
        let entry = &second.data["AAPL"];
        assert!(entry.stale);
        assert_eq!(entry.price, 100.0);
        assert!(second.meta.partial_failures.is_empty());
    }
}
