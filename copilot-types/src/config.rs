//! Typed, environment-sourced configuration (§6, §10.4).
//!
//! One struct per concern, each with a `Default` matching the source's documented
//! defaults, aggregated into [`CopilotConfig`]. `from_env` reads the §6 variable
//! names; any variable that is absent or fails to parse falls back to the default
//! rather than erroring, except for the LLM API keys, whose absence is a legitimate
//! "provider not configured" state surfaced later as `CopilotError::Config`.

use std::env;
use std::time::Duration;

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(key, default_ms))
}

fn env_opt_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Primary LLM provider configuration (OpenAI-style, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    /// `OPENAI_API_KEY`. `None` means the primary provider is not configured.
    pub api_key: Option<String>,
    /// `OPENAI_MODEL`.
    pub model: String,
    /// `OPENAI_MAX_OUTPUT_TOKENS`.
    pub max_output_tokens: u32,
    /// `OPENAI_SYSTEM_PROMPT`, appended to the default system prompt as an override (§4.11 step 1).
    pub system_prompt_override: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_output_tokens: 1024,
            system_prompt_override: None,
        }
    }
}

impl OpenAiConfig {
    fn from_env() -> Self {
        Self {
            api_key: env_opt_string("OPENAI_API_KEY"),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| Self::default().model),
            max_output_tokens: env_u64("OPENAI_MAX_OUTPUT_TOKENS", 1024) as u32,
            system_prompt_override: env_opt_string("OPENAI_SYSTEM_PROMPT"),
        }
    }
}

/// Secondary LLM provider configuration (OpenRouter-style, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRouterConfig {
    /// `OPENROUTER_API_KEY`. `None` means the secondary provider is not configured.
    pub api_key: Option<String>,
    /// `OPENROUTER_MODEL`.
    pub model: String,
    /// `OPENROUTER_BASE_URL`.
    pub base_url: String,
    /// `OPENROUTER_TIMEOUT_MS`; honoured via a cancellation token (§4.11).
    pub timeout: Duration,
    /// `OPENROUTER_SITE_URL`, sent as the `HTTP-Referer` header.
    pub site_url: Option<String>,
    /// `OPENROUTER_SITE_NAME`, sent as the `X-Title` header.
    pub site_name: Option<String>,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "openai/gpt-4o-mini".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            timeout: Duration::from_secs(15),
            site_url: None,
            site_name: None,
        }
    }
}

impl OpenRouterConfig {
    fn from_env() -> Self {
        Self {
            api_key: env_opt_string("OPENROUTER_API_KEY"),
            model: env::var("OPENROUTER_MODEL").unwrap_or_else(|_| Self::default().model),
            base_url: env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| Self::default().base_url),
            timeout: env_duration_ms("OPENROUTER_TIMEOUT_MS", 15_000),
            site_url: env_opt_string("OPENROUTER_SITE_URL"),
            site_name: env_opt_string("OPENROUTER_SITE_NAME"),
        }
    }
}

/// LLM Invocation Layer configuration: both provider configs plus its own cache sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    /// Primary (OpenAI-style) provider settings.
    pub openai: OpenAiConfig,
    /// Secondary (OpenRouter-style) provider settings, tried first when configured.
    pub openrouter: OpenRouterConfig,
    /// `LLM_CACHE_TTL_MS`, default ~5 minutes.
    pub cache_ttl: Duration,
    /// `LLM_CACHE_MAX_ENTRIES`, default 50.
    pub cache_max_entries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            openrouter: OpenRouterConfig::default(),
            cache_ttl: Duration::from_secs(5 * 60),
            cache_max_entries: 50,
        }
    }
}

impl LlmConfig {
    /// Build from the process environment, falling back to documented defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            openai: OpenAiConfig::from_env(),
            openrouter: OpenRouterConfig::from_env(),
            cache_ttl: env_duration_ms("LLM_CACHE_TTL_MS", 5 * 60 * 1000),
            cache_max_entries: env_u64("LLM_CACHE_MAX_ENTRIES", 50) as usize,
        }
    }
}

/// Primary chart provider configuration: rate-limit cooldown (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryChartConfig {
    /// `YAHOO_RETRY_DELAY_MS`: how long to mark the provider rate-limited after a 429.
    pub rate_limit_cooldown: Duration,
}

impl Default for PrimaryChartConfig {
    fn default() -> Self {
        Self {
            rate_limit_cooldown: Duration::from_secs(60),
        }
    }
}

impl PrimaryChartConfig {
    fn from_env() -> Self {
        Self {
            rate_limit_cooldown: env_duration_ms("YAHOO_RETRY_DELAY_MS", 60_000),
        }
    }
}

/// TTL and sizing knobs for every market-data cache (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// `PRICE_CACHE_TTL_MS`, default 2 minutes.
    pub price_ttl: Duration,
    /// `PRICE_CACHE_MAX_ENTRIES`, default 100.
    pub price_max_entries: usize,
    /// `PRICE_MAX_SYMBOLS_PER_REQUEST`; `None` means unlimited (§9 open question; see DESIGN.md).
    pub max_symbols_per_request: Option<usize>,
    /// `PRICE_HISTORY_TTL_MS`, default 6 hours.
    pub daily_history_ttl: Duration,
    /// `PRICE_HISTORY_MAX_ENTRIES`, default 100.
    pub daily_history_max_entries: usize,
    /// `PRICE_INTRADAY_TTL_MS`, default 5 minutes.
    pub intraday_ttl: Duration,
    /// `PRICE_INTRADAY_MAX_ENTRIES`, default 100.
    pub intraday_max_entries: usize,
    /// `PRICE_INTRADAY_LOOKBACK_MS`, default ~30 days (§4.12 step 4a).
    pub intraday_lookback: Duration,
    /// `SYMBOL_SEARCH_TTL_MS`, default 10 minutes.
    pub symbol_search_ttl: Duration,
    /// `SYMBOL_SEARCH_MAX_RESULTS`, default 8 (§4.4 step 5).
    pub symbol_search_max_results: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            price_ttl: Duration::from_secs(2 * 60),
            price_max_entries: 100,
            max_symbols_per_request: None,
            daily_history_ttl: Duration::from_secs(6 * 60 * 60),
            daily_history_max_entries: 100,
            intraday_ttl: Duration::from_secs(5 * 60),
            intraday_max_entries: 100,
            intraday_lookback: Duration::from_secs(30 * 24 * 60 * 60),
            symbol_search_ttl: Duration::from_secs(10 * 60),
            symbol_search_max_results: 8,
        }
    }
}

impl CacheConfig {
    fn from_env() -> Self {
        let d = Self::default();
        Self {
            price_ttl: env_duration_ms("PRICE_CACHE_TTL_MS", d.price_ttl.as_millis() as u64),
            price_max_entries: env_u64(
                "PRICE_CACHE_MAX_ENTRIES",
                d.price_max_entries as u64,
            ) as usize,
            max_symbols_per_request: env::var("PRICE_MAX_SYMBOLS_PER_REQUEST")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .and_then(|v| if v == 0 { None } else { Some(v) }),
            daily_history_ttl: env_duration_ms(
                "PRICE_HISTORY_TTL_MS",
                d.daily_history_ttl.as_millis() as u64,
            ),
            daily_history_max_entries: env_u64(
                "PRICE_HISTORY_MAX_ENTRIES",
                d.daily_history_max_entries as u64,
            ) as usize,
            intraday_ttl: env_duration_ms(
                "PRICE_INTRADAY_TTL_MS",
                d.intraday_ttl.as_millis() as u64,
            ),
            intraday_max_entries: env_u64(
                "PRICE_INTRADAY_MAX_ENTRIES",
                d.intraday_max_entries as u64,
            ) as usize,
            intraday_lookback: env_duration_ms(
                "PRICE_INTRADAY_LOOKBACK_MS",
                d.intraday_lookback.as_millis() as u64,
            ),
            symbol_search_ttl: env_duration_ms(
                "SYMBOL_SEARCH_TTL_MS",
                d.symbol_search_ttl.as_millis() as u64,
            ),
            symbol_search_max_results: env_u64(
                "SYMBOL_SEARCH_MAX_RESULTS",
                d.symbol_search_max_results as u64,
            ) as usize,
        }
    }
}

/// Default monthly [`super::quota::QuotaLimits`] per tier, used by the default
/// `TierLimits` implementation when an operator has not supplied its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDefaultsConfig {
    /// Limits for [`super::quota::Tier::Free`].
    pub free: super::quota::QuotaLimits,
    /// Limits for [`super::quota::Tier::Pro`].
    pub pro: super::quota::QuotaLimits,
    /// Limits for [`super::quota::Tier::Team`].
    pub team: super::quota::QuotaLimits,
}

impl Default for QuotaDefaultsConfig {
    fn default() -> Self {
        use super::quota::QuotaLimits;
        Self {
            free: QuotaLimits {
                insights: 20,
                quotes: 100,
                uploads: 5,
            },
            pro: QuotaLimits {
                insights: 500,
                quotes: 2_000,
                uploads: 100,
            },
            team: QuotaLimits {
                insights: 5_000,
                quotes: 20_000,
                uploads: 1_000,
            },
        }
    }
}

/// Top-level configuration aggregate (§10.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopilotConfig {
    /// LLM Invocation Layer settings.
    pub llm: LlmConfig,
    /// Primary chart provider settings.
    pub primary_chart: PrimaryChartConfig,
    /// Cache TTLs/sizes across the Market Data Resolution & Caching Layer.
    pub cache: CacheConfig,
    /// Default per-tier quota limits.
    pub quota_defaults: QuotaDefaultsConfig,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            primary_chart: PrimaryChartConfig::default(),
            cache: CacheConfig::default(),
            quota_defaults: QuotaDefaultsConfig::default(),
        }
    }
}

impl CopilotConfig {
    /// Build the full configuration from the process environment (§6), falling back
    /// to [`Default`] values for anything absent or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            llm: LlmConfig::from_env(),
            primary_chart: PrimaryChartConfig::from_env(),
            cache: CacheConfig::from_env(),
            quota_defaults: QuotaDefaultsConfig::default(),
        }
    }
}
