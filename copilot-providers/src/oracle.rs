//! The LLM Oracle (§4.9): a last-resort price source consulted only after the
//! primary chart, secondary symbol search, and CSV daily-bar providers have all
//! failed to produce a price.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use copilot_core::CopilotError;
use serde_json::json;

use crate::llm_client::{ChatMessage, LlmProvider};

const SYSTEM_PROMPT: &str = "Respond with compact JSON only.";
const DAILY_BAR_IMPUTED_HOUR_UTC: u32 = 16;

fn price_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "price": {"type": "number"},
            "currency": {"type": "string"},
            "date": {"type": "string"},
        },
        "required": ["price", "currency"],
    })
}

/// A price quoted by the oracle: the model's answer plus the timestamp it is
/// imputed to represent.
#[derive(Debug, Clone, PartialEq)]
pub struct OraclePrice {
    /// The quoted price.
    pub price: f64,
    /// ISO currency code, if the model supplied one.
    pub currency: Option<String>,
    /// The timestamp this price is imputed to represent (§4.9).
    pub timestamp: DateTime<Utc>,
}

/// Asks a configured [`LlmProvider`] for a price when every structured market
/// data source has failed.
pub struct LlmOracleProvider {
    provider: Arc<dyn LlmProvider>,
}

impl LlmOracleProvider {
    /// Build an oracle over the given provider.
    #[must_use]
    pub const fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Ask for `t`'s current price, imputing `now` as its timestamp.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn oracle_current_price(&self, t: &str) -> Result<OraclePrice, CopilotError> {
        let prompt = format!(
            "What is the current market price of the security with ticker or name \"{t}\"? \
             Respond with the price and its currency."
        );
        let price = self.ask(&prompt).await?;
        Ok(OraclePrice {
            price: price.price,
            currency: price.currency,
            timestamp: Utc::now(),
        })
    }

    /// Ask for `t`'s closing price on `iso_date` (`YYYY-MM-DD`), imputing
    /// `{date}T16:00:00Z` as its timestamp (§4.9).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn oracle_historical_price(
        &self,
        t: &str,
        iso_date: &str,
    ) -> Result<OraclePrice, CopilotError> {
        let prompt = format!(
            "What was the closing market price of the security with ticker or name \"{t}\" \
             on {iso_date}? Respond with the price and its currency."
        );
        let price = self.ask(&prompt).await?;
        let timestamp = impute_historical_timestamp(iso_date)?;
        Ok(OraclePrice {
            price: price.price,
            currency: price.currency,
            timestamp,
        })
    }

    async fn ask(&self, prompt: &str) -> Result<RawOraclePrice, CopilotError> {
        let messages = [
            ChatMessage::new("system", SYSTEM_PROMPT),
            ChatMessage::new("user", prompt),
        ];
        let schema = price_schema();
        let value = self.provider.complete(&messages, Some(&schema)).await?;

        let price = value
            .get("price")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| CopilotError::BadModelOutput {
                raw: value.to_string(),
            })?;
        if !price.is_finite() || price <= 0.0 {
            return Err(CopilotError::BadModelOutput {
                raw: value.to_string(),
            });
        }
        let currency = value
            .get("currency")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        Ok(RawOraclePrice { price, currency })
    }
}

struct RawOraclePrice {
    price: f64,
    currency: Option<String>,
}

fn impute_historical_timestamp(iso_date: &str) -> Result<DateTime<Utc>, CopilotError> {
    let naive_date = chrono::NaiveDate::parse_from_str(iso_date, "%Y-%m-%d").map_err(|_| {
        CopilotError::Validation(format!("invalid ISO date for oracle lookup: {iso_date}"))
    })?;
    let naive_dt = naive_date
        .and_hms_opt(DAILY_BAR_IMPUTED_HOUR_UTC, 0, 0)
        .expect("constant hour/min/sec within range");
    Ok(DateTime::from_naive_utc_and_offset(naive_dt, Utc))
}
