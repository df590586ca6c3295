//! The canonical in-memory price record returned by provider fallbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which provider ultimately produced a [`QuoteEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    /// The primary chart endpoint.
    PrimaryChart,
    /// The CSV daily-bar fallback.
    Csv,
    /// The LLM oracle, used as a last resort.
    LlmOracle,
}

/// A disambiguation candidate returned alongside symbol resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSymbol {
    /// External symbol.
    pub symbol: String,
    /// Display name, if known.
    pub name: Option<String>,
    /// Exchange, if known.
    pub exchange: Option<String>,
}

/// Optional descriptive metadata attached to a [`QuoteEntry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteMeta {
    /// Display name.
    pub name: Option<String>,
    /// Asset type string (e.g. "stock", "crypto").
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// External symbol, recorded whenever `source == primary_chart`.
    pub external_symbol: Option<String>,
}

/// The canonical in-memory price record (§3).
///
/// Invariant: `price` is finite and `> 0`; if `source == PrimaryChart` then
/// `meta.external_symbol` is `Some`; `fetched_at` is a monotonic-clock millisecond reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteEntry {
    /// Which provider produced this entry.
    pub source: QuoteSource,
    /// Last trade / close price.
    pub price: f64,
    /// Previous session's close, if known.
    pub previous_close: Option<f64>,
    /// Session open, if known.
    pub open: Option<f64>,
    /// ISO currency code, if known.
    pub currency: Option<String>,
    /// Exchange code, if known.
    pub exchange: Option<String>,
    /// Wall-clock timestamp the price is as-of.
    pub timestamp: DateTime<Utc>,
    /// Descriptive metadata.
    pub meta: QuoteMeta,
    /// Up to 8 disambiguation candidates, present only when resolution searched for one.
    pub candidates: Option<Vec<CandidateSymbol>>,
    /// Monotonic-clock milliseconds at which this entry was produced; used for TTL freshness.
    pub fetched_at: i64,
    /// Set by the batch orchestrator (§4.13) when a fresh fetch failed and a cached
    /// value was substituted; never set by the Quote Service itself.
    pub stale: bool,
}

impl QuoteEntry {
    /// True if `price` satisfies the finite-and-positive invariant.
    #[must_use]
    pub fn has_valid_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_price_rejects_non_finite_and_non_positive() {
        let mut q = QuoteEntry {
            source: QuoteSource::PrimaryChart,
            price: 1.0,
            previous_close: None,
            open: None,
            currency: None,
            exchange: None,
            timestamp: Utc::now(),
            meta: QuoteMeta::default(),
            candidates: None,
            fetched_at: 0,
            stale: false,
        };
        assert!(q.has_valid_price());
        q.price = 0.0;
        assert!(!q.has_valid_price());
        q.price = f64::NAN;
        assert!(!q.has_valid_price());
        q.price = f64::INFINITY;
        assert!(!q.has_valid_price());
        q.price = -5.0;
        assert!(!q.has_valid_price());
    }

    #[test]
    fn wire_round_trip_preserves_fields() {
        let q = QuoteEntry {
            source: QuoteSource::Csv,
            price: 4.12,
            previous_close: Some(4.0),
            open: Some(4.05),
            currency: Some("USD".into()),
            exchange: Some("NASDAQ".into()),
            timestamp: Utc::now(),
            meta: QuoteMeta {
                name: Some("Example Corp".into()),
                kind: Some("stock".into()),
                external_symbol: None,
            },
            candidates: None,
            fetched_at: 123,
            stale: true,
        };
        let json = serde_json::to_string(&q).unwrap();
        let back: QuoteEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.price, q.price);
        assert_eq!(back.timestamp, q.timestamp);
        assert_eq!(back.currency, q.currency);
        assert_eq!(back.source, q.source);
    }
}
