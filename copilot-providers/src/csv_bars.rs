//! The CSV Daily-Bar Provider (§4.8): a last-resort-before-the-oracle daily
//! close series sourced from a plain-text CSV endpoint.

use std::sync::Arc;

use chrono::NaiveDate;
use copilot_core::{CopilotError, FetchOptions, HttpFetcher};
use copilot_types::{DailyPoint, DailySeries};

/// Config for the CSV daily-bar provider.
#[derive(Debug, Clone)]
pub struct CsvDailyBarConfig {
    /// Base URL; the derived secondary symbol is appended as a path segment.
    pub base_url: String,
    /// Per-request deadline.
    pub request_timeout_ms: u64,
}

impl Default for CsvDailyBarConfig {
    fn default() -> Self {
        Self {
            base_url: "https://stooq.example/q/d/l".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Fetches a CSV of `date,open,high,low,close,volume` rows and parses it into
/// an ascending [`DailySeries`].
pub struct CsvDailyBarProvider {
    fetcher: Arc<dyn HttpFetcher>,
    config: CsvDailyBarConfig,
}

impl CsvDailyBarProvider {
    /// Build a new provider over the given fetcher and config.
    #[must_use]
    pub const fn new(fetcher: Arc<dyn HttpFetcher>, config: CsvDailyBarConfig) -> Self {
        Self { fetcher, config }
    }

    /// Fetch and parse the daily series for canonical ticker `t` (§4.8: derive a
    /// secondary external symbol, fetch CSV, discard the header, keep only rows
    /// whose `close` is finite).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), fields(symbol = %t)))]
    pub async fn fetch_daily_series(&self, t: &str) -> Result<DailySeries, CopilotError> {
        let secondary_symbol = derive_secondary_symbol(t);
        let url = format!("{}/{}.txt", self.config.base_url, secondary_symbol);
        let opts = FetchOptions {
            headers: Vec::new(),
            deadline_ms: Some(self.config.request_timeout_ms),
        };
        let text = self.fetcher.fetch_text(&url, opts).await?;
        Ok(parse_csv(&text))
    }
}

/// Lowercase, strip punctuation, and append `.us` when the result has no dot
/// (§4.8).
#[must_use]
pub fn derive_secondary_symbol(t: &str) -> String {
    let cleaned: String = t
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-')
        .collect();
    if cleaned.contains('.') {
        cleaned
    } else {
        format!("{cleaned}.us")
    }
}

fn parse_csv(text: &str) -> DailySeries {
    let mut points = Vec::new();
    for line in text.lines().skip(1) {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 5 {
            continue;
        }
        let Ok(date) = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d") else {
            continue;
        };
        let Ok(close) = fields[4].trim().parse::<f64>() else {
            continue;
        };
        if !close.is_finite() {
            continue;
        }
        points.push(DailyPoint { date, close });
    }
    DailySeries::from_unsorted(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedTextFetcher(String);

    #[async_trait]
    impl HttpFetcher for FixedTextFetcher {
        async fn fetch_json(
            &self,
            _url: &str,
            _opts: FetchOptions,
        ) -> Result<serde_json::Value, CopilotError> {
            unimplemented!()
        }
        async fn fetch_text(&self, _url: &str, _opts: FetchOptions) -> Result<String, CopilotError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn secondary_symbol_strips_punctuation_and_appends_us() {
        assert_eq!(derive_secondary_symbol("BRK B"), "brkb.us");
        assert_eq!(derive_secondary_symbol("NESN.SW"), "nesn.sw");
        assert_eq!(derive_secondary_symbol("BTC-USD"), "btc-usd.us");
    }

    #[tokio::test]
    async fn parses_rows_and_discards_non_finite_closes() {
        let csv = "date,open,high,low,close,volume\n\
                   2024-05-01,10.0,11.0,9.5,10.5,1000\n\
                   2024-05-02,10.5,11.5,10.0,nan,2000\n\
                   2024-05-03,11.0,12.0,10.5,11.25,1500\n";
        let provider = CsvDailyBarProvider::new(
            Arc::new(FixedTextFetcher(csv.to_string())),
            CsvDailyBarConfig::default(),
        );
        let series = provider.fetch_daily_series("AAPL").await.unwrap();
        assert_eq!(series.points().len(), 2);
        assert_eq!(series.last().unwrap().close, 11.25);
    }
}
