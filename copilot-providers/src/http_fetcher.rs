//! A `reqwest`-backed [`HttpFetcher`] (§4.3): parameterised GET with a per-call
//! deadline, JSON/text decoding, and the transport-level error classification
//! (429 → `RateLimit`, other 4xx/5xx → `ProviderError` with a size-capped body).
//!
//! Provider-specific rate-limit detection (e.g. a 200-status body whose error
//! code matches `/rate/i`, §4.6) is the calling provider's concern — this
//! fetcher only classifies what HTTP itself tells it.

use std::time::Duration;

use async_trait::async_trait;
use copilot_core::{CopilotError, FetchOptions, HttpFetcher};
use reqwest::Client;

/// Raw error bodies longer than this are truncated before being embedded in a
/// `ProviderError` message.
const MAX_ERROR_BODY_BYTES: usize = 4096;

/// The default fetcher used outside of tests.
pub struct ReqwestHttpFetcher {
    client: Client,
}

impl ReqwestHttpFetcher {
    /// Wrap an existing `reqwest::Client`.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build with a freshly constructed default client.
    #[must_use]
    pub fn new_default() -> Self {
        Self::new(Client::new())
    }

    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<reqwest::Response, CopilotError> {
        let mut builder = self.client.get(url);
        for (name, value) in &opts.headers {
            builder = builder.header(name, value);
        }
        let send = builder.send();
        let response = match opts.deadline_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), send)
                .await
                .map_err(|_| CopilotError::Timeout { provider: "http" })??,
            None => send.await?,
        };
        Ok(response)
    }

    async fn classify(response: reqwest::Response) -> Result<reqwest::Response, CopilotError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CopilotError::RateLimit {
                provider: "http",
                retry_after_ms: 0,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(MAX_ERROR_BODY_BYTES).collect();
            return Err(CopilotError::ProviderError {
                provider: "http",
                message: format!("HTTP {status}: {truncated}"),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl HttpFetcher for ReqwestHttpFetcher {
    async fn fetch_json(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<serde_json::Value, CopilotError> {
        let response = self.fetch(url, &opts).await?;
        let response = Self::classify(response).await?;
        let value = response.json::<serde_json::Value>().await?;
        Ok(value)
    }

    async fn fetch_text(&self, url: &str, opts: FetchOptions) -> Result<String, CopilotError> {
        let response = self.fetch(url, &opts).await?;
        let response = Self::classify(response).await?;
        let text = response.text().await?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    #[tokio::test]
    async fn fetch_json_decodes_a_successful_response() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/ok");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"price": 1.5}"#);
        });

        let fetcher = ReqwestHttpFetcher::new_default();
        let url = server.url("/ok");
        let value = fetcher.fetch_json(&url, FetchOptions::default()).await.unwrap();
        assert_eq!(value["price"], 1.5);
        mock.assert();
    }

    #[tokio::test]
    async fn a_429_response_becomes_rate_limit() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/limited");
            then.status(429).body("too many requests");
        });

        let fetcher = ReqwestHttpFetcher::new_default();
        let url = server.url("/limited");
        let err = fetcher
            .fetch_json(&url, FetchOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_rate_limit());
        assert_eq!(err.status_code(), 429);
    }

    #[tokio::test]
    async fn a_server_error_becomes_provider_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/broken");
            then.status(500).body("internal error");
        });

        let fetcher = ReqwestHttpFetcher::new_default();
        let url = server.url("/broken");
        let err = fetcher
            .fetch_json(&url, FetchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 502);
    }
}
