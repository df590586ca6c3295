//! The Quote Service (§4.5): cache + single-flight in front of the Symbol
//! Resolver, with CSV and LLM-oracle fallbacks.

use chrono::{TimeZone, Utc};
use copilot_core::CopilotError;
use copilot_types::{QuoteEntry, QuoteMeta, QuoteSource};

use crate::core::Copilot;

/// Options accepted by [`Copilot::get_quote`].
#[derive(Debug, Clone, Default)]
pub struct GetQuoteOptions {
    /// Try the LLM oracle even when a structured source might still work, and
    /// unconditionally when the resolver hit a rate limit (§4.5 step 5).
    pub prefer_oracle: bool,
    /// A display name hint passed through to the Symbol Resolver's scoring bonuses.
    pub expected_name: Option<String>,
}

impl Copilot {
    /// Fetch a live quote for canonical ticker `t` (§4.5), serving from cache
    /// or single-flight-deduplicating concurrent identical requests.
    pub async fn get_quote(
        &self,
        t: &str,
        opts: GetQuoteOptions,
    ) -> Result<QuoteEntry, CopilotError> {
        let canonical = copilot_types::normalise(t);
        let ttl_ms = self.config.cache.price_ttl.as_millis() as i64;
        let now_ms = self.clock.now_ms();
        if let Some(hit) = self.price_cache.get_fresh(&canonical, now_ms, ttl_ms) {
            return Ok(hit);
        }

        let key = canonical.clone();
        let entry = self
            .price_in_flight
            .acquire(key, self.fetch_quote(canonical.clone(), opts))
            .await?;

        self.price_cache.put(canonical, entry.clone(), self.clock.now_ms());
        Ok(entry)
    }

    async fn fetch_quote(
        &self,
        canonical: String,
        opts: GetQuoteOptions,
    ) -> Result<QuoteEntry, CopilotError> {
        let resolved = self
            .resolve_symbol(&canonical, opts.expected_name.as_deref())
            .await;

        if let Some(mut entry) = resolved.entry {
            entry.candidates = Some(resolved.candidates);
            return Ok(entry);
        }

        if let Ok(series) = self.csv_provider.fetch_daily_series(&canonical).await {
            if let Some(last) = series.last() {
                if last.close.is_finite() && last.close > 0.0 {
                    let timestamp = Utc
                        .from_utc_datetime(&last.date.and_hms_opt(20, 0, 0).expect("valid hour"));
                    return Ok(QuoteEntry {
                        source: QuoteSource::Csv,
                        price: last.close,
                        previous_close: None,
                        open: None,
                        currency: None,
                        exchange: None,
                        timestamp,
                        meta: QuoteMeta::default(),
                        candidates: Some(resolved.candidates),
                        fetched_at: self.clock.now_ms(),
                        stale: false,
                    });
                }
            }
        }

        if opts.prefer_oracle || (resolved.rate_limited) {
            let oracle_price = self.oracle.oracle_current_price(&canonical).await?;
            return Ok(QuoteEntry {
                source: QuoteSource::LlmOracle,
                price: oracle_price.price,
                previous_close: None,
                open: None,
                currency: oracle_price.currency,
                exchange: None,
                timestamp: oracle_price.timestamp,
                meta: QuoteMeta::default(),
                candidates: Some(resolved.candidates),
                fetched_at: self.clock.now_ms(),
                stale: false,
            });
        }

        Err(CopilotError::not_found(format!("quote for {canonical}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use copilot_mock::{InMemoryUsageStore, MockBehavior, MockHttpFetcher};
    use serde_json::json;

    use super::*;

    fn build_copilot(fetcher: Arc<MockHttpFetcher>) -> Copilot {
        Copilot::builder()
            .http_fetcher(fetcher)
            .usage_store(Arc::new(InMemoryUsageStore::default()))
            .build()
            .unwrap()
    }

    fn chart_ok() -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL", "currency": "USD", "exchangeName": "NMS"},
                    "timestamp": [1_700_000_000],
                    "indicators": {"quote": [{"close": [150.0]}]}
                }],
                "error": null
            }
        })
    }

    #[tokio::test]
    async fn a_resolved_quote_is_served_from_cache_on_the_second_call() {
        let (fetcher, ctl) = MockHttpFetcher::new_with_controller();
        ctl.push_json("chart", MockBehavior::Return(chart_ok()));
        ctl.push_json("search", MockBehavior::Return(json!({"quotes": []})));
        let copilot = build_copilot(Arc::new(fetcher));

        let first = copilot.get_quote("AAPL", GetQuoteOptions::default()).await.unwrap();
        assert_eq!(first.price, 150.0);

        // No further HTTP responses are scripted; a second call must be a cache hit.
        let second = copilot.get_quote("AAPL", GetQuoteOptions::default()).await.unwrap();
        assert_eq!(second.price, 150.0);
    }

    #[tokio::test]
    async fn a_rate_limit_falls_back_to_the_csv_provider() {
        let (fetcher, ctl) = MockHttpFetcher::new_with_controller();
        ctl.push_json(
            "chart",
            MockBehavior::Fail(CopilotError::RateLimit {
                provider: "primary_chart",
                retry_after_ms: 1_000,
            }),
        );
        ctl.push_json("search", MockBehavior::Return(json!({"quotes": []})));
        let csv = "date,open,high,low,close,volume\n2024-05-01,1.0,1.0,1.0,12.5,100\n";
        ctl.push_text("stooq", MockBehavior::Return(csv.to_string()));
        let copilot = build_copilot(Arc::new(fetcher));

        let entry = copilot
            .get_quote("UNKNOWNXYZ", GetQuoteOptions::default())
            .await
            .unwrap();
        assert_eq!(entry.source, QuoteSource::Csv);
        assert_eq!(entry.price, 12.5);
    }

    #[tokio::test]
    async fn no_provider_data_is_a_not_found_error() {
        let (fetcher, ctl) = MockHttpFetcher::new_with_controller();
        let not_found = json!({"chart": {"result": [], "error": {"code": "Not Found", "description": "no data"}}});
        ctl.push_json("chart", MockBehavior::Return(not_found));
        ctl.push_json("search", MockBehavior::Return(json!({"quotes": []})));
        ctl.push_text(
            "stooq",
            MockBehavior::Fail(CopilotError::provider_error("csv", "unavailable")),
        );
        let copilot = build_copilot(Arc::new(fetcher));

        let err = copilot
            .get_quote("UNKNOWNXYZ", GetQuoteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CopilotError::NotFound { .. }));
    }
}
