//! Request/cache-key shapes for the LLM Invocation Layer (§3, §4.11).

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A request to `invoke_llm` / the basis of `extract_structured` (§4.11, §4.14).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// The user-supplied prompt text.
    pub prompt: String,
    /// An optional JSON Schema the response must conform to.
    pub schema: Option<serde_json::Value>,
    /// An optional system-instruction override, appended after the default system prompt.
    pub system_override: Option<String>,
    /// Whether the caller is augmenting the prompt with externally-fetched context
    /// (`add_context_from_internet`); true for every `extract_structured` call.
    pub context_flag: bool,
}

/// A stable encoding of `(prompt, schema, system_override, context_flag)` so that
/// semantically-equal invocations hash and compare equal regardless of incidental
/// JSON key ordering in `schema` (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LlmCacheKey(String);

impl LlmCacheKey {
    /// Build the cache key for an [`InvokeRequest`].
    #[must_use]
    pub fn from_request(req: &InvokeRequest) -> Self {
        Self::new(
            &req.prompt,
            req.schema.as_ref(),
            req.system_override.as_deref(),
            req.context_flag,
        )
    }

    /// Build the cache key directly from its components.
    #[must_use]
    pub fn new(
        prompt: &str,
        schema: Option<&serde_json::Value>,
        system_override: Option<&str>,
        context_flag: bool,
    ) -> Self {
        // Canonicalise the schema by round-tripping through a BTreeMap-backed
        // serialization so key order never affects equality; serde_json's `to_string`
        // over `Value` preserves insertion order for objects, so we re-serialize via
        // a canonical form instead of relying on that order matching.
        let schema_repr = schema.map(canonical_json).unwrap_or_default();
        let system_repr = system_override.unwrap_or_default();
        Self(format!(
            "{}\u{1}{}\u{1}{}\u{1}{}",
            prompt, schema_repr, system_repr, context_flag
        ))
    }
}

fn canonical_json(value: &serde_json::Value) -> String {
    fn sort(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut sorted = serde_json::Map::new();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for k in keys {
                    sorted.insert(k.clone(), sort(&map[k]));
                }
                serde_json::Value::Object(sorted)
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(sort).collect())
            }
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

impl std::fmt::Display for LlmCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Cache-key values may embed prompt text; never logged directly (§10.1 says
        // log a hash, never the raw prompt), so this Display is for internal map
        // storage only.
        write!(f, "{:x}", simple_hash(&self.0))
    }
}

fn simple_hash(s: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Which LLM provider ultimately produced a cached `invoke_llm` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderTag {
    /// The primary (OpenAI-style) provider.
    OpenAi,
    /// The secondary (OpenRouter-style) provider.
    OpenRouter,
}

impl LlmProviderTag {
    /// The tag's lowercase wire name, as used in `meta.provider` (§6).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
        }
    }
}
