//! The LLM Invocation Layer (§4.11) and the Extract-Structured endpoint (§4.14)
//! built on top of it.

use std::sync::Arc;

use async_trait::async_trait;
use copilot_core::{CopilotError, CurrentUser, FetchOptions};
use copilot_providers::{ChatMessage, LlmProvider};
use copilot_types::{InvokeRequest, LlmCacheKey, LlmProviderTag, UsageDelta};
use serde_json::Value;

use crate::core::Copilot;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a concise financial research assistant embedded in a portfolio copilot.";
const CONTEXT_ADVISORY: &str =
    "Augment your answer with current information from the supplied document context where relevant.";
const EXTRACT_FETCH_DEADLINE_MS: u64 = 15_000;

/// A cached `invoke_llm` outcome: the model's parsed answer, which provider
/// answered, and whether this call served it from cache.
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    /// The parsed, schema-conformant (when a schema was requested) result.
    pub result: Value,
    /// Which provider ultimately produced the cached value.
    pub provider: LlmProviderTag,
    /// True if this call was served from the LLM cache rather than a fresh completion.
    pub cached: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct LlmCachedResult {
    pub value: Value,
    pub provider: LlmProviderTag,
}

/// The ordered secondary-then-primary provider chain (§4.11 step 4): tries the
/// secondary (OpenRouter-style) provider first when configured, demoting to
/// the primary (OpenAI-style) provider on any failure; a provider absent from
/// the chain (no API key configured) is skipped rather than attempted.
pub(crate) struct LlmChain {
    secondary: Option<Arc<dyn LlmProvider>>,
    primary: Option<Arc<dyn LlmProvider>>,
}

impl LlmChain {
    pub(crate) fn new(secondary: Option<Arc<dyn LlmProvider>>, primary: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { secondary, primary }
    }

    pub(crate) async fn complete(
        &self,
        messages: &[ChatMessage],
        schema: Option<&Value>,
    ) -> Result<(Value, LlmProviderTag), CopilotError> {
        if self.secondary.is_none() && self.primary.is_none() {
            return Err(CopilotError::Config {
                message: "no LLM provider is configured; set OPENAI_API_KEY or OPENROUTER_API_KEY".to_string(),
            });
        }

        if let Some(secondary) = &self.secondary {
            match secondary.complete(messages, schema).await {
                Ok(value) => return Ok((value, secondary.tag())),
                Err(_err) if self.primary.is_some() => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_err, "secondary LLM provider failed, demoting to primary");
                }
                Err(err) => return Err(err),
            }
        }

        let primary = self.primary.as_ref().expect("checked above: at least one provider is configured");
        let value = primary.complete(messages, schema).await?;
        Ok((value, primary.tag()))
    }
}

/// Adapts an [`LlmChain`] to the single-provider [`LlmProvider`] shape the
/// [`LlmOracleProvider`](copilot_providers::LlmOracleProvider) expects. The
/// oracle never inspects `tag()`, so the fixed nominal tag below is never
/// observed by a caller.
pub(crate) struct ChainLlmProvider(pub(crate) Arc<LlmChain>);

#[async_trait]
impl LlmProvider for ChainLlmProvider {
    async fn complete(&self, messages: &[ChatMessage], schema: Option<&Value>) -> Result<Value, CopilotError> {
        self.0.complete(messages, schema).await.map(|(value, _tag)| value)
    }

    fn tag(&self) -> LlmProviderTag {
        LlmProviderTag::OpenAi
    }
}

fn build_messages(cfg: &copilot_types::config::OpenAiConfig, req: &InvokeRequest) -> Vec<ChatMessage> {
    let mut system = cfg
        .system_prompt_override
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    if let Some(override_) = req.system_override.as_deref() {
        system.push(' ');
        system.push_str(override_);
    }
    if req.context_flag {
        system.push(' ');
        system.push_str(CONTEXT_ADVISORY);
    }
    vec![
        ChatMessage::new("system", system),
        ChatMessage::new("user", req.prompt.clone()),
    ]
}

impl Copilot {
    /// Invoke the configured LLM chain for `req` (§4.11), serving from cache
    /// or single-flight-deduplicating concurrent identical requests, and
    /// charging one `insight` unit of quota on success.
    pub async fn invoke_llm(
        &self,
        user: &dyn CurrentUser,
        req: InvokeRequest,
    ) -> Result<InvokeOutcome, CopilotError> {
        self.quota_gate.check(user, UsageDelta::insight(1)).await?;

        let key = LlmCacheKey::from_request(&req);
        let now_ms = self.clock.now_ms();
        let ttl_ms = self.config.llm.cache_ttl.as_millis() as i64;
        if let Some(cached) = self.llm_cache.get_fresh(&key, now_ms, ttl_ms) {
            return Ok(InvokeOutcome {
                result: cached.value,
                provider: cached.provider,
                cached: true,
            });
        }

        let messages = build_messages(&self.config.llm.openai, &req);
        let schema = req.schema.clone();
        let chain = Arc::clone(&self.llm_chain);
        let produce = async move {
            let (value, tag) = chain.complete(&messages, schema.as_ref()).await?;
            Ok(LlmCachedResult { value, provider: tag })
        };
        let result = self.llm_in_flight.acquire(key.clone(), produce).await?;
        self.llm_cache.put(key, result.clone(), self.clock.now_ms());

        self.quota_gate.consume(user, UsageDelta::insight(1)).await?;

        Ok(InvokeOutcome {
            result: result.value,
            provider: result.provider,
            cached: false,
        })
    }

    /// Fetch `file_url`'s text content and ask the LLM to transcribe it into
    /// `schema` (§4.14): a thin wrapper over `invoke_llm` with
    /// `context_flag = true` and no caller-supplied system override.
    pub async fn extract_structured(
        &self,
        user: &dyn CurrentUser,
        file_url: &str,
        schema: Value,
    ) -> Result<Value, CopilotError> {
        let opts = FetchOptions {
            headers: Vec::new(),
            deadline_ms: Some(EXTRACT_FETCH_DEADLINE_MS),
        };
        let content = self.fetcher.fetch_text(file_url, opts).await?;
        let prompt = format!(
            "Transcribe the following document content into the requested JSON schema. \
             Document content follows:\n\n{content}"
        );
        let req = InvokeRequest {
            prompt,
            schema: Some(schema),
            system_override: None,
            context_flag: true,
        };
        let outcome = self.invoke_llm(user, req).await?;
        Ok(outcome.result)
    }
}
