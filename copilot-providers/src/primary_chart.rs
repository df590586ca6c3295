//! The Primary Chart Provider (§4.6): the public chart/quote endpoint used for
//! both live quotes and ranged historical series. Tracks a shared,
//! process-wide rate-limit cooldown via [`RateLimitGate`].

use copilot_core::{Clock, CopilotError, FetchOptions, HttpFetcher, RateLimitGate};
use copilot_types::{Series, SeriesPoint};
use std::sync::Arc;

/// Endpoint settings for the primary chart provider. The shared cooldown
/// duration itself lives in [`copilot_types::config::PrimaryChartConfig`];
/// this struct carries the transport details that config doesn't: the base
/// URL and per-request deadline, plus the cooldown in millisecond form the
/// gate wants.
#[derive(Debug, Clone)]
pub struct PrimaryChartEndpointConfig {
    /// Base URL for the chart endpoint, e.g. `https://example.test/chart`.
    pub base_url: String,
    /// Cooldown applied after a detected rate limit (§4.6: "cooldown ≈ 60 s").
    pub rate_limit_cooldown_ms: i64,
    /// Per-request deadline.
    pub request_timeout_ms: u64,
}

impl Default for PrimaryChartEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.example/v8/finance/chart".to_string(),
            rate_limit_cooldown_ms: 60_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl From<&copilot_types::config::PrimaryChartConfig> for PrimaryChartEndpointConfig {
    fn from(cfg: &copilot_types::config::PrimaryChartConfig) -> Self {
        Self {
            rate_limit_cooldown_ms: cfg.rate_limit_cooldown.as_millis() as i64,
            ..Self::default()
        }
    }
}

/// Metadata returned alongside a chart's OHLC series.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartMeta {
    /// The exchange-qualified symbol the provider recognised.
    pub external_symbol: String,
    /// ISO currency code, if present.
    pub currency: Option<String>,
    /// Exchange identifier, if present.
    pub exchange: Option<String>,
}

/// A decoded chart response: metadata plus an ascending close-price series.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartResult {
    /// Symbol/currency/exchange metadata.
    pub meta: ChartMeta,
    /// Ascending, finite-valued close series.
    pub series: Series,
}

/// Calls the public chart endpoint, decodes `meta` + OHLC arrays, and classifies
/// 429s and rate-limit-shaped error bodies into a shared cooldown.
pub struct PrimaryChartProvider {
    fetcher: Arc<dyn HttpFetcher>,
    rate_limit: Arc<RateLimitGate>,
    clock: Clock,
    config: PrimaryChartEndpointConfig,
}

impl PrimaryChartProvider {
    /// Build a new provider over the given fetcher and config. `rate_limit` is
    /// shared with [`crate::symbol_search::SymbolSearchProvider`] (§4.7: search
    /// "respects the shared `rateLimitedUntil` flag") so a cooldown tripped by
    /// one endpoint is observed by the other.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        rate_limit: Arc<RateLimitGate>,
        clock: Clock,
        config: PrimaryChartEndpointConfig,
    ) -> Self {
        Self {
            fetcher,
            rate_limit,
            clock,
            config,
        }
    }

    /// Fetch a chart for `external_symbol` at `range`/`interval`. Returns `Ok(None)`
    /// on a "Not Found" response body (a soft miss, not an error).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), fields(symbol = %external_symbol)))]
    pub async fn fetch_chart(
        &self,
        external_symbol: &str,
        range: &str,
        interval: &str,
    ) -> Result<Option<ChartResult>, CopilotError> {
        let now_ms = self.clock.now_ms();
        if self.rate_limit.is_limited(now_ms) {
            let retry_after_ms = (self.rate_limit.until_ms() - now_ms).max(0) as u64;
            return Err(CopilotError::RateLimit {
                provider: "primary_chart",
                retry_after_ms,
            });
        }

        let url = format!(
            "{}?symbol={}&range={}&interval={}",
            self.config.base_url, external_symbol, range, interval
        );
        let opts = FetchOptions {
            headers: Vec::new(),
            deadline_ms: Some(self.config.request_timeout_ms),
        };

        let body = match self.fetcher.fetch_json(&url, opts).await {
            Ok(body) => body,
            Err(CopilotError::RateLimit { .. }) => {
                self.trip_rate_limit(now_ms);
                return Err(CopilotError::RateLimit {
                    provider: "primary_chart",
                    retry_after_ms: self.config.rate_limit_cooldown_ms.max(0) as u64,
                });
            }
            Err(other) => return Err(other),
        };

        parse_chart_body(&body, self, now_ms)
    }

    fn trip_rate_limit(&self, now_ms: i64) {
        self.rate_limit
            .set_until(now_ms.saturating_add(self.config.rate_limit_cooldown_ms));
    }
}

fn parse_chart_body(
    body: &serde_json::Value,
    provider: &PrimaryChartProvider,
    now_ms: i64,
) -> Result<Option<ChartResult>, CopilotError> {
    let chart = body.get("chart").unwrap_or(body);

    if let Some(error) = chart.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(|v| v.as_str()).unwrap_or("");
        let description = error.get("description").and_then(|v| v.as_str()).unwrap_or("");
        if looks_like_not_found(code) || looks_like_not_found(description) {
            return Ok(None);
        }
        if looks_like_rate_limit(code) || looks_like_rate_limit(description) {
            provider.trip_rate_limit(now_ms);
            return Err(CopilotError::RateLimit {
                provider: "primary_chart",
                retry_after_ms: provider.config.rate_limit_cooldown_ms.max(0) as u64,
            });
        }
        return Err(CopilotError::provider_error(
            "primary_chart",
            format!("{code}: {description}"),
        ));
    }

    let results = chart
        .get("result")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let Some(result) = results.into_iter().next() else {
        return Ok(None);
    };

    let meta_value = result.get("meta").cloned().unwrap_or(serde_json::Value::Null);
    let external_symbol = meta_value
        .get("symbol")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    if external_symbol.is_empty() {
        return Ok(None);
    }
    let meta = ChartMeta {
        external_symbol,
        currency: meta_value
            .get("currency")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        exchange: meta_value
            .get("exchangeName")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    };

    let timestamps: Vec<i64> = result
        .get("timestamp")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(serde_json::Value::as_i64).collect())
        .unwrap_or_default();
    let closes: Vec<Option<f64>> = result
        .pointer("/indicators/quote/0/close")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().map(|v| v.as_f64()).collect())
        .unwrap_or_default();

    let points: Vec<SeriesPoint> = timestamps
        .into_iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = close?;
            if !close.is_finite() {
                return None;
            }
            let timestamp = chrono::DateTime::from_timestamp(ts, 0)?;
            Some(SeriesPoint { timestamp, close })
        })
        .collect();

    Ok(Some(ChartResult {
        meta,
        series: Series::from_unsorted(points),
    }))
}

fn looks_like_not_found(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.contains("not found") || lower.contains("no data")
}

fn looks_like_rate_limit(s: &str) -> bool {
    s.to_ascii_lowercase().contains("rate")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedFetcher {
        responses: Mutex<Vec<Result<serde_json::Value, CopilotError>>>,
    }

    #[async_trait]
    impl HttpFetcher for ScriptedFetcher {
        async fn fetch_json(
            &self,
            _url: &str,
            _opts: FetchOptions,
        ) -> Result<serde_json::Value, CopilotError> {
            self.responses.lock().unwrap().remove(0)
        }
        async fn fetch_text(&self, _url: &str, _opts: FetchOptions) -> Result<String, CopilotError> {
            unimplemented!()
        }
    }

    fn chart_ok_body() -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL", "currency": "USD", "exchangeName": "NMS"},
                    "timestamp": [1_700_000_000, 1_700_003_600],
                    "indicators": {"quote": [{"close": [150.0, 151.5]}]}
                }],
                "error": null
            }
        })
    }

    #[tokio::test]
    async fn successful_chart_decodes_meta_and_series() {
        let fetcher = Arc::new(ScriptedFetcher {
            responses: Mutex::new(vec![Ok(chart_ok_body())]),
        });
        let provider = PrimaryChartProvider::new(fetcher, Arc::new(RateLimitGate::new()), Clock::new(), PrimaryChartEndpointConfig::default());
        let result = provider.fetch_chart("AAPL", "1d", "1m").await.unwrap().unwrap();
        assert_eq!(result.meta.external_symbol, "AAPL");
        assert_eq!(result.series.len(), 2);
    }

    #[tokio::test]
    async fn not_found_error_code_is_a_soft_miss() {
        let body = json!({"chart": {"result": [], "error": {"code": "Not Found", "description": "no data"}}});
        let fetcher = Arc::new(ScriptedFetcher {
            responses: Mutex::new(vec![Ok(body)]),
        });
        let provider = PrimaryChartProvider::new(fetcher, Arc::new(RateLimitGate::new()), Clock::new(), PrimaryChartEndpointConfig::default());
        let result = provider.fetch_chart("NOPE", "1d", "1m").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn rate_limit_error_code_trips_the_cooldown() {
        let body = json!({"chart": {"result": [], "error": {"code": "Too Many Requests", "description": "rate limited"}}});
        let fetcher = Arc::new(ScriptedFetcher {
            responses: Mutex::new(vec![Ok(body)]),
        });
        let provider = PrimaryChartProvider::new(fetcher, Arc::new(RateLimitGate::new()), Clock::new(), PrimaryChartEndpointConfig::default());
        let err = provider.fetch_chart("AAPL", "1d", "1m").await.unwrap_err();
        assert!(err.is_rate_limit());

        // A second call should short-circuit without touching the fetcher.
        let err2 = provider.fetch_chart("AAPL", "1d", "1m").await.unwrap_err();
        assert!(err2.is_rate_limit());
    }
}
