//! The Price Details Orchestrator (§4.12): current price plus an optional
//! historical price resolved through an ordered fallback chain.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone, Utc};
use copilot_core::{CopilotError, CurrentUser};
use copilot_types::{QuoteEntry, QuoteMeta, QuoteSource, UsageDelta};

use crate::core::Copilot;
use crate::quote_service::GetQuoteOptions;

const DEFAULT_IMPUTED_TIME_HOUR: u32 = 16;

/// The full price-details response (§4.12 step 6).
#[derive(Debug, Clone)]
pub struct PriceDetails {
    /// Canonical ticker the caller asked about.
    pub symbol: String,
    /// Display name, if known.
    pub name: Option<String>,
    /// Asset type string, if known.
    pub kind: Option<String>,
    /// Current price.
    pub current_price: f64,
    /// Timestamp the current price is as-of.
    pub current_price_timestamp: DateTime<Utc>,
    /// Historical price, if a `date` was requested and one could be resolved.
    pub historical_price: Option<f64>,
    /// The originally-requested ISO date string, echoed back.
    pub historical_price_date: Option<String>,
    /// Timestamp the historical price is as-of.
    pub historical_price_timestamp: Option<DateTime<Utc>>,
    /// Session open, if known.
    pub current_open: Option<f64>,
    /// Previous session's close, if known.
    pub previous_close: Option<f64>,
    /// Which provider produced the current-price portion of this response.
    pub provider: QuoteSource,
    /// Descriptive metadata carried through from the underlying quote.
    pub metadata: QuoteMeta,
}

fn parse_date(date: &str) -> Result<NaiveDate, CopilotError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| CopilotError::Validation(format!("invalid date, expected YYYY-MM-DD: {date}")))
}

fn parse_time(time: &str) -> Result<NaiveTime, CopilotError> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| CopilotError::Validation(format!("invalid time, expected HH:MM: {time}")))
}

fn select_range(diff: ChronoDuration, has_time: bool) -> (&'static str, &'static str) {
    if has_time && diff <= ChronoDuration::days(5) {
        ("5d", "5m")
    } else if diff <= ChronoDuration::days(30) {
        ("1mo", "1d")
    } else if diff <= ChronoDuration::days(365) {
        ("1y", "1d")
    } else if diff <= ChronoDuration::days(5 * 365) {
        ("5y", "1wk")
    } else {
        ("max", "1mo")
    }
}

impl Copilot {
    /// Resolve current (and, when requested, historical) price details for
    /// canonical ticker `t` (§4.12).
    pub async fn get_price_details(
        &self,
        user: &dyn CurrentUser,
        t: &str,
        date: Option<&str>,
        time: Option<&str>,
        prefer_oracle: bool,
    ) -> Result<PriceDetails, CopilotError> {
        let canonical = copilot_types::normalise(t);
        if canonical.is_empty() {
            return Err(CopilotError::Validation("ticker must not be empty".to_string()));
        }
        if time.is_some() && date.is_none() {
            return Err(CopilotError::Validation(
                "a time can only be supplied alongside a date".to_string(),
            ));
        }
        let naive_date = date.map(parse_date).transpose()?;
        let naive_time = time.map(parse_time).transpose()?;
        let target_dt = naive_date.map(|d| {
            let t = naive_time.unwrap_or_else(|| NaiveTime::from_hms_opt(DEFAULT_IMPUTED_TIME_HOUR, 0, 0).expect("valid"));
            Utc.from_utc_datetime(&d.and_time(t))
        });

        self.quota_gate.check(user, UsageDelta::quotes(1)).await?;

        let current_entry = self.current_price_for(&canonical, prefer_oracle).await?;

        let (historical_price, historical_price_timestamp) = if let Some(target_dt) = target_dt {
            self.historical_price_for(
                &canonical,
                target_dt,
                naive_time.is_some(),
                date.expect("date present when target_dt is Some"),
                prefer_oracle,
                &current_entry,
            )
            .await
        } else {
            (None, None)
        };

        self.quota_gate.consume(user, UsageDelta::quotes(1)).await?;

        Ok(PriceDetails {
            symbol: canonical,
            name: current_entry.meta.name.clone(),
            kind: current_entry.meta.kind.clone(),
            current_price: current_entry.price,
            current_price_timestamp: current_entry.timestamp,
            historical_price,
            historical_price_date: date.map(str::to_string),
            historical_price_timestamp,
            current_open: current_entry.open,
            previous_close: current_entry.previous_close,
            provider: current_entry.source,
            metadata: current_entry.meta,
        })
    }

    async fn current_price_for(
        &self,
        canonical: &str,
        prefer_oracle: bool,
    ) -> Result<QuoteEntry, CopilotError> {
        if let Ok(entry) = self
            .get_quote(
                canonical,
                GetQuoteOptions {
                    prefer_oracle,
                    expected_name: None,
                },
            )
            .await
        {
            return Ok(entry);
        }

        let series = self
            .csv_provider
            .fetch_daily_series(canonical)
            .await
            .map_err(|_| CopilotError::not_found(format!("quote for {canonical}")))?;
        let last = series
            .last()
            .ok_or_else(|| CopilotError::not_found(format!("quote for {canonical}")))?;
        if !last.close.is_finite() || last.close <= 0.0 {
            return Err(CopilotError::not_found(format!("quote for {canonical}")));
        }
        let timestamp = Utc.from_utc_datetime(&last.date.and_hms_opt(20, 0, 0).expect("valid hour"));
        Ok(QuoteEntry {
            source: QuoteSource::Csv,
            price: last.close,
            previous_close: None,
            open: None,
            currency: None,
            exchange: None,
            timestamp,
            meta: QuoteMeta::default(),
            candidates: None,
            fetched_at: self.clock.now_ms(),
            stale: false,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn historical_price_for(
        &self,
        canonical: &str,
        target_dt: DateTime<Utc>,
        has_time: bool,
        iso_date: &str,
        prefer_oracle: bool,
        current_entry: &QuoteEntry,
    ) -> (Option<f64>, Option<DateTime<Utc>>) {
        let now = self.clock.now_utc();
        let diff = (now - target_dt).abs();
        let intraday_lookback =
            ChronoDuration::from_std(self.config.cache.intraday_lookback).unwrap_or(ChronoDuration::zero());

        if has_time && diff <= intraday_lookback {
            if let Ok(series) = self.get_intraday_series(canonical).await {
                if let Some(point) = series.find_closest(target_dt) {
                    return (Some(point.close), Some(point.timestamp));
                }
            }
        }

        if let Ok(series) = self.get_daily_series(canonical).await {
            if let Some(point) = series.find_closest(target_dt) {
                return (Some(point.close), Some(point.timestamp));
            }
        }

        if let Ok(series) = self.csv_provider.fetch_daily_series(canonical).await {
            if let Some(point) = series.find_closest(target_dt) {
                return (Some(point.close), Some(point.timestamp));
            }
        }

        if prefer_oracle {
            if let Ok(price) = self.oracle.oracle_historical_price(canonical, iso_date).await {
                return (Some(price.price), Some(price.timestamp));
            }
        }

        let (range, interval) = select_range(diff, has_time);
        if let Ok(series) = self.fetch_series(canonical.to_string(), range, interval).await {
            if let Some(point) = series.find_closest(target_dt) {
                return (Some(point.close), Some(point.timestamp));
            }
        }

        (Some(current_entry.price), Some(current_entry.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use copilot_mock::{InMemoryUsageStore, MockBehavior, MockHttpFetcher, StaticUser};
    use copilot_types::Tier;
    use serde_json::json;

    use super::*;

    fn build_copilot(fetcher: Arc<MockHttpFetcher>) -> Copilot {
        Copilot::builder()
            .http_fetcher(fetcher)
            .usage_store(Arc::new(InMemoryUsageStore::default()))
            .build()
            .unwrap()
    }

    fn chart_ok(closes: Vec<f64>) -> serde_json::Value {
        let timestamps: Vec<i64> = (0..closes.len()).map(|i| 1_700_000_000 + i as i64 * 86_400).collect();
        json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL", "currency": "USD", "exchangeName": "NMS"},
                    "timestamp": timestamps,
                    "indicators": {"quote": [{"close": closes}]}
                }],
                "error": null
            }
        })
    }

    #[tokio::test]
    async fn an_empty_ticker_is_rejected_before_any_network_call() {
        let (fetcher, _ctl) = MockHttpFetcher::new_with_controller();
        let copilot = build_copilot(Arc::new(fetcher));
        let user = StaticUser::new("u1", Tier::Free);
        let err = copilot
            .get_price_details(&user, "   ", None, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, CopilotError::Validation(_)));
    }

    #[tokio::test]
    async fn a_time_without_a_date_is_rejected() {
        let (fetcher, _ctl) = MockHttpFetcher::new_with_controller();
        let copilot = build_copilot(Arc::new(fetcher));
        let user = StaticUser::new("u1", Tier::Free);
        let err = copilot
            .get_price_details(&user, "AAPL", None, Some("10:30"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CopilotError::Validation(_)));
    }

    #[tokio::test]
    async fn current_price_only_request_skips_the_historical_chain() {
        let (fetcher, ctl) = MockHttpFetcher::new_with_controller();
        ctl.push_json("chart", MockBehavior::Return(chart_ok(vec![100.0])));
        ctl.push_json("search", MockBehavior::Return(json!({"quotes": []})));
        let copilot = build_copilot(Arc::new(fetcher));
        let user = StaticUser::new("u1", Tier::Free);

        let details = copilot
            .get_price_details(&user, "AAPL", None, None, false)
            .await
            .unwrap();
        assert_eq!(details.current_price, 100.0);
        assert!(details.historical_price.is_none());
    }
}
