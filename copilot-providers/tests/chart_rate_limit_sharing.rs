//! A rate limit tripped by the primary chart provider must also gate symbol
//! search, since both calls hit the same upstream and share one cooldown
//! (§4.7: "respects the shared `rateLimitedUntil` flag").

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use copilot_core::{Clock, CopilotError, FetchOptions, HttpFetcher, RateLimitGate};
use copilot_providers::symbol_search::{SymbolSearchConfig, SymbolSearchProvider};
use copilot_providers::{PrimaryChartEndpointConfig, PrimaryChartProvider};
use serde_json::json;

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

#[tokio::test]
async fn a_rate_limit_tripped_by_the_chart_provider_also_blocks_symbol_search() {
    let rate_limit_error = json!({
        "chart": {"result": [], "error": {"code": "Too Many Requests", "description": "rate limited"}}
    });
    let chart_fetcher = Arc::new(ScriptedFetcher {
        responses: Mutex::new(vec![Ok(rate_limit_error)]),
    });

    // One shared gate, handed to both providers, the way a caller wiring them
    // together for one external host would.
    let shared_gate = Arc::new(RateLimitGate::new());
    let clock = Clock::new();

    let chart = PrimaryChartProvider::new(
        chart_fetcher,
        Arc::clone(&shared_gate),
        clock.clone(),
        PrimaryChartEndpointConfig::default(),
    );
    let err = chart.fetch_chart("AAPL", "1d", "1m").await.unwrap_err();
    assert!(err.is_rate_limit(), "chart fetch must report the rate limit");

    // The real chart call above tripped the shared gate; search over the SAME
    // gate must now short-circuit without even touching its own fetcher.
    let search_fetcher = Arc::new(ScriptedFetcher {
        responses: Mutex::new(vec![Ok(json!({"quotes": []}))]),
    });
    let search = SymbolSearchProvider::new(
        search_fetcher,
        Arc::clone(&shared_gate),
        clock,
        SymbolSearchConfig::default(),
    );

    let results = search.search("anything").await;
    assert!(
        results.is_empty(),
        "search must short-circuit while the shared gate is tripped"
    );
}
