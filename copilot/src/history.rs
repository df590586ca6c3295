//! The History / Intraday Service (§4.10): ranged chart series, cached and
//! single-flight-guarded independently from the live quote.

use copilot_core::CopilotError;
use copilot_types::Series;

use crate::core::Copilot;

const DAILY_RANGE: &str = "max";
const DAILY_INTERVAL: &str = "1d";
const INTRADAY_RANGE: &str = "5d";
const INTRADAY_INTERVAL: &str = "5m";

impl Copilot {
    /// Fetch the full-history daily close series for canonical ticker `t` (§4.10).
    pub async fn get_daily_series(&self, t: &str) -> Result<Series, CopilotError> {
        let canonical = copilot_types::normalise(t);
        let ttl_ms = self.config.cache.daily_history_ttl.as_millis() as i64;
        let now_ms = self.clock.now_ms();
        if let Some(hit) = self.daily_cache.get_fresh(&canonical, now_ms, ttl_ms) {
            return Ok(hit);
        }

        let series = self
            .daily_in_flight
            .acquire(
                canonical.clone(),
                self.fetch_series(canonical.clone(), DAILY_RANGE, DAILY_INTERVAL),
            )
            .await?;
        self.daily_cache.put(canonical, series.clone(), self.clock.now_ms());
        Ok(series)
    }

    /// Fetch a five-day, five-minute-bar intraday series for canonical ticker `t` (§4.10).
    pub async fn get_intraday_series(&self, t: &str) -> Result<Series, CopilotError> {
        let canonical = copilot_types::normalise(t);
        let ttl_ms = self.config.cache.intraday_ttl.as_millis() as i64;
        let now_ms = self.clock.now_ms();
        if let Some(hit) = self.intraday_cache.get_fresh(&canonical, now_ms, ttl_ms) {
            return Ok(hit);
        }

        let series = self
            .intraday_in_flight
            .acquire(
                canonical.clone(),
                self.fetch_series(canonical.clone(), INTRADAY_RANGE, INTRADAY_INTERVAL),
            )
            .await?;
        self.intraday_cache.put(canonical, series.clone(), self.clock.now_ms());
        Ok(series)
    }

    /// Resolve `canonical` to an external symbol and fetch its chart at
    /// `range`/`interval`, used by both series endpoints and the Price Details
    /// Orchestrator's range-selected fallback (§4.12 step 4e).
    pub(crate) async fn fetch_series(
        &self,
        canonical: String,
        range: &str,
        interval: &str,
    ) -> Result<Series, CopilotError> {
        let external = self.resolve_external_symbol(&canonical).await?;
        let chart = self
            .primary_chart
            .fetch_chart(&external, range, interval)
            .await?;
        chart
            .map(|c| c.series)
            .ok_or_else(|| CopilotError::not_found(format!("series for {canonical}")))
    }

    /// Resolve `canonical` to an external symbol, preferring the mapping cache
    /// a prior [`Copilot::get_quote`]/resolver call populated (§4.10: "via
    /// Quote Service's mapping cache, or a dedicated resolver call").
    pub(crate) async fn resolve_external_symbol(&self, canonical: &str) -> Result<String, CopilotError> {
        if let Some(mapped) = self.yahoo_symbol_cache.get(&canonical.to_string()) {
            return Ok(mapped.value);
        }
        let resolved = self.resolve_symbol(canonical, None).await;
        resolved
            .entry
            .and_then(|entry| entry.meta.external_symbol)
            .ok_or_else(|| {
                if resolved.rate_limited {
                    CopilotError::RateLimit {
                        provider: "primary_chart",
                        retry_after_ms: 0,
                    }
                } else {
                    CopilotError::not_found(format!("symbol mapping for {canonical}"))
                }
            })
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

    fn chart_ok(closes: Vec<f64>) -> serde_json::Value {
        let timestamps: Vec<i64> = (0..closes.len()).map(|i| 1_700_000_000 + i as i64 * 60).collect();
        json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL", "currency": "USD", "exchangeName": "NMS"},
                    "timestamp": timestamps,
                    "indicators": {"quote": [{"close": closes}]}
                }],
                "error": null
            }
        })
    }

    #[tokio::test]
    async fn daily_series_resolves_the_symbol_then_caches_the_result() {
        let (fetcher, ctl) = MockHttpFetcher::new_with_controller();
        // First chart call resolves the symbol via the resolver; second fetches the series.
        ctl.push_json("chart", MockBehavior::Return(chart_ok(vec![1.0])));
        ctl.push_json("search", MockBehavior::Return(json!({"quotes": []})));
        ctl.push_json("chart", MockBehavior::Return(chart_ok(vec![10.0, 11.0, 12.0])));
        let copilot = build_copilot(Arc::new(fetcher));

        let series = copilot.get_daily_series("AAPL").await.unwrap();
        assert_eq!(series.len(), 3);

        // No more HTTP responses scripted; a second call must hit the cache.
        let cached = copilot.get_daily_series("AAPL").await.unwrap();
        assert_eq!(cached.len(), 3);
    }

    #[tokio::test]
    async fn a_prior_mapping_cache_entry_skips_resolution() {
        let (fetcher, ctl) = MockHttpFetcher::new_with_controller();
        ctl.push_json("chart", MockBehavior::Return(chart_ok(vec![1.0])));
        ctl.push_json("search", MockBehavior::Return(json!({"quotes": []})));
        ctl.push_json("chart", MockBehavior::Return(chart_ok(vec![5.0])));
        let copilot = build_copilot(Arc::new(fetcher));

        // Warms the mapping cache.
        let _ = copilot.get_quote("AAPL", crate::quote_service::GetQuoteOptions::default()).await.unwrap();

        let series = copilot.get_intraday_series("AAPL").await.unwrap();
        assert_eq!(series.last().unwrap().close, 5.0);
    }
}
