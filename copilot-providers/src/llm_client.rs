//! Thin HTTP clients for the two LLM backends the LLM Invocation Layer can call
//! (§4.11 step 4): a primary, OpenAI-style Responses API client and a secondary,
//! OpenRouter-style Chat Completions client. Both speak JSON over `reqwest`
//! directly rather than through [`copilot_core::HttpFetcher`], since that trait
//! is GET-only (§4.3) and these are authenticated POSTs with a request body.
//!
//! Response parsing (§4.11 steps 6-7: message-part extraction, then
//! strict-then-loose JSON recovery) is shared between both backends and reused
//! by the LLM Oracle (§4.9); see [`extract_payload`].

use std::time::Duration;

use async_trait::async_trait;
use copilot_core::CopilotError;
use copilot_types::config::{OpenAiConfig, OpenRouterConfig};
use copilot_types::LlmProviderTag;
use reqwest::Client;
use serde_json::{json, Value};

use crate::json_repair::parse_loose;

/// Raw error bodies longer than this are truncated before being embedded in a
/// `ProviderError` message.
const MAX_ERROR_BODY_BYTES: usize = 4096;

/// Sampling/length options every request applies (§4.11 step 5).
const TEMPERATURE: f64 = 0.2;
const TOP_P: f64 = 0.8;

/// One turn in the conversation sent to an LLM backend.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: &'static str,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a message with the given role and content.
    #[must_use]
    pub fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A chat-style completion backend. Implementors apply §4.11 step 5's sampling
/// options and, when `schema` is present, request a schema-constrained response.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `messages` (optionally schema-constrained) and return the parsed
    /// JSON payload, already run through message-part extraction and
    /// strict-then-loose repair (§4.11 steps 6-7).
    async fn complete(
        &self,
        messages: &[ChatMessage],
        schema: Option<&Value>,
    ) -> Result<Value, CopilotError>;

    /// Which provider this is, for cache/result tagging (§6 `meta.provider`).
    fn tag(&self) -> LlmProviderTag;
}

/// The primary, OpenAI-style provider. Speaks the Responses API, which returns
/// a convenience `output_text` field or, for schema-constrained requests, a
/// structured `output_json_schema.output` field.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    const RESPONSES_URL: &'static str = "https://api.openai.com/v1/responses";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Build a provider over the given client and config.
    #[must_use]
    pub const fn new(client: Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, messages, schema)))]
    async fn complete(
        &self,
        messages: &[ChatMessage],
        schema: Option<&Value>,
    ) -> Result<Value, CopilotError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| CopilotError::missing_api_key("openai"))?;

        let input: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "input": input,
            "temperature": TEMPERATURE,
            "top_p": TOP_P,
            "max_output_tokens": self.config.max_output_tokens,
        });
        if let Some(schema) = schema {
            body["text"] = json!({
                "format": {
                    "type": "json_schema",
                    "name": "result",
                    "schema": schema,
                    "strict": true,
                }
            });
        }

        let response = self
            .client
            .post(Self::RESPONSES_URL)
            .bearer_auth(api_key)
            .timeout(Self::REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|err| classify_transport_error(&err, "openai"))?;

        let body = classify_response(response, "openai").await?;
        extract_payload(&body, schema.is_some())
    }

    fn tag(&self) -> LlmProviderTag {
        LlmProviderTag::OpenAi
    }
}

/// The secondary, OpenRouter-style provider. Speaks the Chat Completions API
/// (`choices[0].message.content`), honours a dedicated request timeout
/// (§4.11: "a separate timeout (~15s)"), and sends the operator's attribution
/// headers when configured.
pub struct OpenRouterProvider {
    client: Client,
    config: OpenRouterConfig,
}

impl OpenRouterProvider {
    /// Build a provider over the given client and config.
    #[must_use]
    pub const fn new(client: Client, config: OpenRouterConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, messages, schema)))]
    async fn complete(
        &self,
        messages: &[ChatMessage],
        schema: Option<&Value>,
    ) -> Result<Value, CopilotError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| CopilotError::missing_api_key("openrouter"))?;

        let chat_messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": chat_messages,
            "temperature": TEMPERATURE,
            "top_p": TOP_P,
        });
        if let Some(schema) = schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {"name": "result", "schema": schema, "strict": true},
            });
        }

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).bearer_auth(api_key).json(&body);
        if let Some(site_url) = &self.config.site_url {
            request = request.header("HTTP-Referer", site_url);
        }
        if let Some(site_name) = &self.config.site_name {
            request = request.header("X-Title", site_name);
        }

        let send = request.send();
        let response = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| CopilotError::Timeout { provider: "openrouter" })?
            .map_err(|err| classify_transport_error(&err, "openrouter"))?;

        let body = classify_response(response, "openrouter").await?;
        extract_payload(&body, schema.is_some())
    }

    fn tag(&self) -> LlmProviderTag {
        LlmProviderTag::OpenRouter
    }
}

fn classify_transport_error(err: &reqwest::Error, provider: &'static str) -> CopilotError {
    if err.is_timeout() {
        CopilotError::Timeout { provider }
    } else {
        CopilotError::provider_error(provider, err.to_string())
    }
}

/// Classify the HTTP-level outcome of an LLM call. A bare 401 is rewritten as
/// `Config` (§7: "represents operator misconfiguration, not a client fault"),
/// not surfaced as an opaque provider error.
async fn classify_response(
    response: reqwest::Response,
    provider: &'static str,
) -> Result<Value, CopilotError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(CopilotError::Config {
            message: format!("{provider} rejected the request as unauthenticated; verify API key"),
        });
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(CopilotError::RateLimit {
            provider,
            retry_after_ms: 0,
        });
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let truncated: String = text.chars().take(MAX_ERROR_BODY_BYTES).collect();
        return Err(CopilotError::ProviderError {
            provider,
            message: format!("HTTP {status}: {truncated}"),
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|err| CopilotError::provider_error(provider, err.to_string()))
}

/// Extract the model's answer from a raw response body and run it through
/// strict-then-loose JSON recovery (§4.11 steps 6-7).
///
/// Tries, in order: a schema-shaped structured field (`output_json_schema.output`,
/// `output`, `json`, `parsed`) when `schema_requested`; the Responses API's
/// `output_text` convenience field; and the Chat Completions shape
/// (`choices[0].message.content`, either a string or an array of `{type, text}`
/// parts).
pub fn extract_payload(body: &Value, schema_requested: bool) -> Result<Value, CopilotError> {
    if schema_requested {
        if let Some(structured) = body
            .pointer("/output_json_schema/output")
            .or_else(|| body.get("output"))
            .or_else(|| body.get("json"))
            .or_else(|| body.get("parsed"))
        {
            if !structured.is_null() {
                return Ok(structured.clone());
            }
        }
    }

    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return parse_loose(text);
    }

    let content = body.pointer("/choices/0/message/content");
    match content {
        Some(Value::String(text)) => parse_loose(text),
        Some(Value::Array(parts)) => {
            let joined: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("");
            parse_loose(&joined)
        }
        _ => Err(CopilotError::BadModelOutput {
            raw: body.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_structured_output_json_schema_field() {
        let body = json!({"output_json_schema": {"output": {"price": 1.0}}});
        let value = extract_payload(&body, true).unwrap();
        assert_eq!(value, json!({"price": 1.0}));
    }

    #[test]
    fn extracts_output_text_and_repairs_it() {
        let body = json!({"output_text": "```json\n{\"price\": 2.5}\n```"});
        let value = extract_payload(&body, false).unwrap();
        assert_eq!(value, json!({"price": 2.5}));
    }

    #[test]
    fn extracts_chat_completions_string_content() {
        let body = json!({"choices": [{"message": {"content": "{\"price\": 3.0}"}}]});
        let value = extract_payload(&body, false).unwrap();
        assert_eq!(value, json!({"price": 3.0}));
    }

    #[test]
    fn extracts_chat_completions_array_content() {
        let body = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "{\"price\""},
            {"type": "text", "text": ": 4.0}"},
        ]}}]});
        let value = extract_payload(&body, false).unwrap();
        assert_eq!(value, json!({"price": 4.0}));
    }

    #[test]
    fn unrecognised_shape_raises_bad_model_output() {
        let body = json!({"unexpected": true});
        let err = extract_payload(&body, false).unwrap_err();
        assert!(matches!(err, CopilotError::BadModelOutput { .. }));
    }
}
