//! The Symbol Resolver (§4.4): scores a candidate set of external symbols for
//! a canonical ticker and walks it in descending-score order against the
//! Primary Chart Provider until one yields a well-formed quote.

use copilot_core::CopilotError;
use copilot_types::{
    AssetKind, CandidateSymbol, QuoteEntry, QuoteMeta, QuoteSource, SeriesPoint, lookup,
    syntactic_variants,
};

use crate::core::Copilot;

const QUOTE_RANGE: &str = "1d";
const QUOTE_INTERVAL: &str = "1m";
const MAX_REPORTED_CANDIDATES: usize = 8;

const SCORE_DIRECTORY: i32 = 100;
const SCORE_MAPPING_CACHE: i32 = 80;
const SCORE_SYNTACTIC_VARIANT: i32 = 40;
const SCORE_SEARCH_BASE: i32 = 60;
const BONUS_EXACT_NAME: i32 = 80;
const BONUS_SUBSTRING_NAME: i32 = 40;
const BONUS_DIRECTORY_NAME: i32 = 40;

struct ScoredCandidate {
    symbol: String,
    score: i32,
    name: Option<String>,
    exchange: Option<String>,
}

/// Outcome of resolving a canonical ticker to a live quote: the winning entry
/// (if any), up to [`MAX_REPORTED_CANDIDATES`] disambiguation candidates, and
/// whether a rate limit cut the search short.
pub struct ResolveOutcome {
    /// The first candidate that produced a well-formed quote, if any.
    pub entry: Option<QuoteEntry>,
    /// Disambiguation candidates, reported regardless of whether `entry` resolved.
    pub candidates: Vec<CandidateSymbol>,
    /// True if a `RateLimit` error stopped the search before exhausting candidates.
    pub rate_limited: bool,
}

impl Copilot {
    /// Resolve `canonical` to a live quote, trying candidate external symbols
    /// in descending score order (§4.4).
    pub(crate) async fn resolve_symbol(
        &self,
        canonical: &str,
        expected_name: Option<&str>,
    ) -> ResolveOutcome {
        let directory = lookup(canonical);
        let mut scored = build_candidates(self, canonical, directory, expected_name).await;
        dedupe_keep_first(&mut scored);
        scored.sort_by(|a, b| b.score.cmp(&a.score));

        let candidates = scored
            .iter()
            .take(MAX_REPORTED_CANDIDATES)
            .map(|c| CandidateSymbol {
                symbol: c.symbol.clone(),
                name: c.name.clone(),
                exchange: c.exchange.clone(),
            })
            .collect();

        let directory_kind = directory.map(|d| d.kind);
        let directory_name = directory.map(|d| d.name.clone());

        for candidate in &scored {
            match self
                .primary_chart
                .fetch_chart(&candidate.symbol, QUOTE_RANGE, QUOTE_INTERVAL)
                .await
            {
                Ok(Some(chart)) => {
                    if let Some(entry) = build_quote_entry(
                        &chart,
                        self.clock.now_ms(),
                        directory_name.clone(),
                        directory_kind,
                        candidate.name.clone(),
                    ) {
                        self.yahoo_symbol_cache.put(
                            canonical.to_string(),
                            chart.meta.external_symbol.clone(),
                            self.clock.now_ms(),
                        );
                        return ResolveOutcome {
                            entry: Some(entry),
                            candidates,
                            rate_limited: false,
                        };
                    }
                }
                Ok(None) => continue,
                Err(err) if err.is_rate_limit() => {
                    return ResolveOutcome {
                        entry: None,
                        candidates,
                        rate_limited: true,
                    };
                }
                Err(_) => continue,
            }
        }

        ResolveOutcome {
            entry: None,
            candidates,
            rate_limited: false,
        }
    }
}

async fn build_candidates(
    copilot: &Copilot,
    canonical: &str,
    directory: Option<&'static copilot_types::DirectoryEntry>,
    expected_name: Option<&str>,
) -> Vec<ScoredCandidate> {
    let mut scored = Vec::new();

    if let Some(entry) = directory {
        scored.push(ScoredCandidate {
            symbol: entry.external_symbol.clone(),
            score: SCORE_DIRECTORY,
            name: Some(entry.name.clone()),
            exchange: None,
        });
    }

    if let Some(mapped) = copilot.yahoo_symbol_cache.get(&canonical.to_string()) {
        scored.push(ScoredCandidate {
            symbol: mapped.value,
            score: SCORE_MAPPING_CACHE,
            name: None,
            exchange: None,
        });
    }

    for variant in syntactic_variants(canonical) {
        scored.push(ScoredCandidate {
            symbol: variant,
            score: SCORE_SYNTACTIC_VARIANT,
            name: None,
            exchange: None,
        });
    }

    let directory_name = directory.map(|d| d.name.as_str());
    let search_results = copilot.symbol_search.search(canonical).await;
    for (rank, result) in search_results.into_iter().enumerate() {
        let mut score = SCORE_SEARCH_BASE - rank as i32;
        if let Some(name) = result.name.as_deref() {
            if directory_name.is_some_and(|d| d.eq_ignore_ascii_case(name)) {
                score += BONUS_DIRECTORY_NAME;
            }
            score += expected_name_bonus(expected_name, name);
        }
        scored.push(ScoredCandidate {
            symbol: result.symbol,
            score,
            name: result.name,
            exchange: result.exchange,
        });
    }

    scored
}

fn expected_name_bonus(expected_name: Option<&str>, candidate_name: &str) -> i32 {
    match expected_name {
        Some(expected) if expected.eq_ignore_ascii_case(candidate_name) => BONUS_EXACT_NAME,
        Some(expected) => {
            let expected_lower = expected.to_ascii_lowercase();
            let candidate_lower = candidate_name.to_ascii_lowercase();
            if candidate_lower.contains(&expected_lower) || expected_lower.contains(&candidate_lower) {
                BONUS_SUBSTRING_NAME
            } else {
                0
            }
        }
        None => 0,
    }
}

fn dedupe_keep_first(scored: &mut Vec<ScoredCandidate>) {
    let mut seen = std::collections::HashSet::new();
    scored.retain(|c| seen.insert(c.symbol.clone()));
}

fn build_quote_entry(
    chart: &copilot_providers::ChartResult,
    now_ms: i64,
    directory_name: Option<String>,
    directory_kind: Option<AssetKind>,
    candidate_name: Option<String>,
) -> Option<QuoteEntry> {
    let series = &chart.series;
    let last = series.last()?;
    if !last.close.is_finite() || last.close <= 0.0 {
        return None;
    }

    let points = series.points();
    let previous_close = points
        .len()
        .checked_sub(2)
        .and_then(|i| points.get(i))
        .map(|p| p.close);
    let open = same_day_open(points, last);

    Some(QuoteEntry {
        source: QuoteSource::PrimaryChart,
        price: last.close,
        previous_close,
        open,
        currency: chart.meta.currency.clone(),
        exchange: chart.meta.exchange.clone(),
        timestamp: last.timestamp,
        meta: QuoteMeta {
            name: candidate_name.or(directory_name),
            kind: directory_kind.map(|k| k.as_str().to_string()),
            external_symbol: Some(chart.meta.external_symbol.clone()),
        },
        candidates: None,
        fetched_at: now_ms,
        stale: false,
    })
}

fn same_day_open(points: &[SeriesPoint], last: &SeriesPoint) -> Option<f64> {
    let last_date = last.timestamp.date_naive();
    points
        .iter()
        .find(|p| p.timestamp.date_naive() == last_date)
        .map(|p| p.close)
}
