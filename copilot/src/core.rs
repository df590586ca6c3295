//! The `Copilot` orchestrator: owns every cache, single-flight map, provider,
//! and the Quota Gate, and is built through [`CopilotBuilder`].

use std::sync::Arc;

use copilot_core::{Clock, CopilotError, HttpFetcher, RateLimitGate, TierLimits, UsageStore};
use copilot_middleware::{QuotaGate, SingleFlightMap, TtlLruCache};
use copilot_providers::{
    CsvDailyBarConfig, CsvDailyBarProvider, LlmOracleProvider, LlmProvider, OpenAiProvider,
    OpenRouterProvider, PrimaryChartEndpointConfig, PrimaryChartProvider, SymbolSearchConfig,
    SymbolSearchProvider,
};
use copilot_types::config::QuotaDefaultsConfig;
use copilot_types::{CopilotConfig, LlmCacheKey, QuoteEntry, Series, Tier};

use crate::llm::{ChainLlmProvider, LlmCachedResult, LlmChain};

/// Capacity of the `canonical -> external symbol` memo cache. Unlike the price
/// and series caches this one has no TTL — a resolved mapping does not go
/// stale the way a quote does (§9 open question; see DESIGN.md).
const YAHOO_SYMBOL_CACHE_ENTRIES: usize = 500;

/// Shared state for every Market Data Resolution & Caching Layer and LLM
/// Invocation Layer operation: caches, single-flight maps, providers, and the
/// Quota Gate. Build one with [`CopilotBuilder`] and share it (it is cheaply
/// cloneable behind an `Arc` at the call site, though `Copilot` itself holds
/// its collaborators behind `Arc` internally so methods only need `&self`).
pub struct Copilot {
    pub(crate) config: CopilotConfig,
    pub(crate) clock: Clock,
    pub(crate) fetcher: Arc<dyn HttpFetcher>,
    #[allow(dead_code)]
    pub(crate) rate_limit: Arc<RateLimitGate>,
    pub(crate) primary_chart: Arc<PrimaryChartProvider>,
    pub(crate) symbol_search: Arc<SymbolSearchProvider>,
    pub(crate) csv_provider: Arc<CsvDailyBarProvider>,
    pub(crate) oracle: Arc<LlmOracleProvider>,
    pub(crate) llm_chain: Arc<LlmChain>,
    pub(crate) quota_gate: Arc<QuotaGate>,

    pub(crate) yahoo_symbol_cache: TtlLruCache<String, String>,
    pub(crate) price_cache: TtlLruCache<String, QuoteEntry>,
    pub(crate) price_in_flight: SingleFlightMap<String, QuoteEntry, CopilotError>,
    pub(crate) daily_cache: TtlLruCache<String, Series>,
    pub(crate) daily_in_flight: SingleFlightMap<String, Series, CopilotError>,
    pub(crate) intraday_cache: TtlLruCache<String, Series>,
    pub(crate) intraday_in_flight: SingleFlightMap<String, Series, CopilotError>,
    pub(crate) llm_cache: TtlLruCache<LlmCacheKey, LlmCachedResult>,
    pub(crate) llm_in_flight: SingleFlightMap<LlmCacheKey, LlmCachedResult, CopilotError>,
}

/// A [`TierLimits`] backed by [`QuotaDefaultsConfig`], the default an operator
/// gets from `CopilotBuilder` unless they supply their own.
pub struct ConfigTierLimits(QuotaDefaultsConfig);

impl TierLimits for ConfigTierLimits {
    fn limits_for(&self, tier: Tier) -> copilot_types::QuotaLimits {
        match tier {
            Tier::Free => self.0.free,
            Tier::Pro => self.0.pro,
            Tier::Team => self.0.team,
        }
    }
}

/// Builds a [`Copilot`]. Required: an [`HttpFetcher`] and a [`UsageStore`] (the
/// external persistence boundaries this crate never implements itself, §1).
/// Everything else defaults from [`CopilotConfig::default`] / [`CopilotConfig::from_env`].
#[derive(Default)]
pub struct CopilotBuilder {
    config: Option<CopilotConfig>,
    clock: Option<Clock>,
    fetcher: Option<Arc<dyn HttpFetcher>>,
    usage_store: Option<Arc<dyn UsageStore>>,
    tier_limits: Option<Arc<dyn TierLimits>>,
    llm_primary: Option<Arc<dyn LlmProvider>>,
    llm_secondary: Option<Arc<dyn LlmProvider>>,
}

impl CopilotBuilder {
    /// Start a builder with every optional knob unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` instead of [`CopilotConfig::default`].
    #[must_use]
    pub fn config(mut self, config: CopilotConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a specific [`Clock`] instead of one anchored to construction time.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Required: the [`HttpFetcher`] every GET-based provider calls through.
    #[must_use]
    pub fn http_fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Required: the external, transactional usage-counter store (§3, §4.15).
    #[must_use]
    pub fn usage_store(mut self, usage_store: Arc<dyn UsageStore>) -> Self {
        self.usage_store = Some(usage_store);
        self
    }

    /// Override the default (config-driven) per-tier [`QuotaLimits`](copilot_types::QuotaLimits) mapping.
    #[must_use]
    pub fn tier_limits(mut self, tier_limits: Arc<dyn TierLimits>) -> Self {
        self.tier_limits = Some(tier_limits);
        self
    }

    /// Override the primary (OpenAI-style) LLM provider, bypassing config-driven
    /// construction. Chiefly for tests that inject a scripted provider.
    #[must_use]
    pub fn llm_primary(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.llm_primary = Some(provider);
        self
    }

    /// Override the secondary (OpenRouter-style) LLM provider, bypassing
    /// config-driven construction.
    #[must_use]
    pub fn llm_secondary(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.llm_secondary = Some(provider);
        self
    }

    /// Assemble the [`Copilot`]. Fails with [`CopilotError::Config`] if a
    /// required collaborator was never supplied.
    pub fn build(self) -> Result<Copilot, CopilotError> {
        let fetcher = self.fetcher.ok_or_else(|| CopilotError::Config {
            message: "CopilotBuilder requires an HttpFetcher (http_fetcher(...))".to_string(),
        })?;
        let usage_store = self.usage_store.ok_or_else(|| CopilotError::Config {
            message: "CopilotBuilder requires a UsageStore (usage_store(...))".to_string(),
        })?;
        let config = self.config.unwrap_or_default();
        let clock = self.clock.unwrap_or_default();
        let tier_limits = self
            .tier_limits
            .unwrap_or_else(|| Arc::new(ConfigTierLimits(config.quota_defaults)));

        let rate_limit = Arc::new(RateLimitGate::new());
        let primary_chart = Arc::new(PrimaryChartProvider::new(
            Arc::clone(&fetcher),
            Arc::clone(&rate_limit),
            clock.clone(),
            PrimaryChartEndpointConfig::from(&config.primary_chart),
        ));
        let symbol_search_config = SymbolSearchConfig {
            cache_ttl_ms: config.cache.symbol_search_ttl.as_millis() as i64,
            max_results: config.cache.symbol_search_max_results,
            ..SymbolSearchConfig::default()
        };
        let symbol_search = Arc::new(SymbolSearchProvider::new(
            Arc::clone(&fetcher),
            Arc::clone(&rate_limit),
            clock.clone(),
            symbol_search_config,
        ));
        let csv_provider = Arc::new(CsvDailyBarProvider::new(
            Arc::clone(&fetcher),
            CsvDailyBarConfig::default(),
        ));

        let http_client = reqwest::Client::new();
        let primary_llm = self.llm_primary.or_else(|| {
            config.llm.openai.api_key.as_ref().map(|_| {
                Arc::new(OpenAiProvider::new(http_client.clone(), config.llm.openai.clone()))
                    as Arc<dyn LlmProvider>
            })
        });
        let secondary_llm = self.llm_secondary.or_else(|| {
            config.llm.openrouter.api_key.as_ref().map(|_| {
                Arc::new(OpenRouterProvider::new(http_client.clone(), config.llm.openrouter.clone()))
                    as Arc<dyn LlmProvider>
            })
        });
        let llm_chain = Arc::new(LlmChain::new(secondary_llm, primary_llm));
        let oracle = Arc::new(LlmOracleProvider::new(Arc::new(ChainLlmProvider(Arc::clone(&llm_chain)))));

        let quota_gate = Arc::new(QuotaGate::new(usage_store, tier_limits));

        Ok(Copilot {
            price_cache: TtlLruCache::new(config.cache.price_max_entries),
            daily_cache: TtlLruCache::new(config.cache.daily_history_max_entries),
            intraday_cache: TtlLruCache::new(config.cache.intraday_max_entries),
            llm_cache: TtlLruCache::new(config.llm.cache_max_entries),
            yahoo_symbol_cache: TtlLruCache::new(YAHOO_SYMBOL_CACHE_ENTRIES),
            config,
            clock,
            fetcher,
            rate_limit,
            primary_chart,
            symbol_search,
            csv_provider,
            oracle,
            llm_chain,
            quota_gate,
            price_in_flight: SingleFlightMap::new(),
            daily_in_flight: SingleFlightMap::new(),
            intraday_in_flight: SingleFlightMap::new(),
            llm_in_flight: SingleFlightMap::new(),
        })
    }
}

impl Copilot {
    /// Start building a `Copilot`.
    #[must_use]
    pub fn builder() -> CopilotBuilder {
        CopilotBuilder::new()
    }

    /// Best-effort free-text symbol search (§4.7), exposed directly for
    /// clients that want to let a user disambiguate before calling
    /// `get_quote`/`get_price_details`.
    pub async fn search_symbol(&self, query: &str) -> Vec<copilot_types::CandidateSymbol> {
        self.symbol_search.search(query).await
    }
}
