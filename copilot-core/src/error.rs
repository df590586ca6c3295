//! The unified error taxonomy (§7, §10.2).
//!
//! `CopilotError` carries exactly the kinds named in §7 as variants, each with the
//! fields needed to reconstruct its HTTP status and a sanitised message, so an
//! outer HTTP layer (out of scope per §1) can render a response without
//! re-deriving the mapping.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Unified error type for the copilot core.
///
/// `Clone` is derived so a single producer's failure can be broadcast verbatim to
/// every caller awaiting the same single-flight key (§4.2 failure propagation).
#[derive(Debug, Clone, Error)]
pub enum CopilotError {
    /// Request validation failed (400).
    #[error("validation error: {0}")]
    Validation(String),

    /// No valid session (401).
    #[error("unauthenticated")]
    Unauthenticated,

    /// A symbol resolved but no provider yielded data, or a referenced resource is
    /// absent (404).
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "quote for AAPL".
        what: String,
    },

    /// The Quota Gate rejected the request (429).
    #[error("quota exceeded: {remaining} remaining, resets in {reset_in_ms}ms")]
    QuotaExceeded {
        /// Units remaining in the current period after this (rejected) request.
        remaining: u64,
        /// Milliseconds until the quota period resets.
        reset_in_ms: u64,
    },

    /// A provider signalled a rate limit (429); may carry a cooldown deadline.
    #[error("rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimit {
        /// The provider that rate-limited the request.
        provider: &'static str,
        /// Milliseconds until the provider may be tried again.
        retry_after_ms: u64,
    },

    /// A provider call exceeded its deadline (504).
    #[error("timeout calling {provider}")]
    Timeout {
        /// The provider whose call timed out.
        provider: &'static str,
    },

    /// A generic upstream provider error (502).
    #[error("provider error from {provider}: {message}")]
    ProviderError {
        /// The provider that returned the error.
        provider: &'static str,
        /// A human-readable (pre-sanitisation) message.
        message: String,
    },

    /// A required API key or other operator configuration is missing (500).
    #[error("configuration error: {message}")]
    Config {
        /// A human-readable description of what is misconfigured.
        message: String,
    },

    /// The LLM returned text that could not be coerced to the requested schema (502).
    #[error("model output could not be parsed as the requested schema")]
    BadModelOutput {
        /// The raw, unparsed model output, included for diagnosis.
        raw: String,
    },
}

impl CopilotError {
    /// The HTTP status code this error kind maps to (§7).
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthenticated => 401,
            Self::NotFound { .. } => 404,
            Self::QuotaExceeded { .. } | Self::RateLimit { .. } => 429,
            Self::Timeout { .. } => 504,
            Self::ProviderError { .. } | Self::BadModelOutput { .. } => 502,
            Self::Config { .. } => 500,
        }
    }

    /// The outward-facing message with any secret-shaped substrings redacted (§7).
    ///
    /// A bare 401 from any LLM provider is rewritten as `Config` at the call site
    /// (§7: "represents operator misconfiguration, not a client fault"); this
    /// accessor only performs redaction, not that reclassification.
    #[must_use]
    pub fn sanitized_message(&self) -> String {
        redact(&self.to_string())
    }

    /// Build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Build a `ProviderError` for a provider name and message.
    pub fn provider_error(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider,
            message: message.into(),
        }
    }

    /// Build a `Config` error for a missing API key.
    pub fn missing_api_key(provider: &'static str) -> Self {
        Self::Config {
            message: format!("{provider} API key is not configured; verify API key"),
        }
    }

    /// True if this error represents a rate limit (used by orchestrators deciding
    /// whether to continue a fallback chain, §4.5 step 3/4).
    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }
}

/// Redact substrings matching `(sk|OPENAI|OPENROUTER)[-_A-Za-z0-9]+` (§7).
#[must_use]
pub fn redact(message: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"(sk|OPENAI|OPENROUTER)[-_A-Za-z0-9]+").expect("static pattern is valid")
    });
    re.replace_all(message, "[redacted]").into_owned()
}

impl From<reqwest::Error> for CopilotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { provider: "http" }
        } else {
            Self::ProviderError {
                provider: "http",
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for CopilotError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadModelOutput {
            raw: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_the_contract_table() {
        assert_eq!(CopilotError::Validation("x".into()).status_code(), 400);
        assert_eq!(CopilotError::Unauthenticated.status_code(), 401);
        assert_eq!(
            CopilotError::not_found("AAPL").status_code(),
            404
        );
        assert_eq!(
            CopilotError::QuotaExceeded {
                remaining: 0,
                reset_in_ms: 0
            }
            .status_code(),
            429
        );
        assert_eq!(
            CopilotError::RateLimit {
                provider: "primary_chart",
                retry_after_ms: 0
            }
            .status_code(),
            429
        );
        assert_eq!(
            CopilotError::Timeout { provider: "x" }.status_code(),
            504
        );
        assert_eq!(
            CopilotError::provider_error("x", "y").status_code(),
            502
        );
        assert_eq!(
            CopilotError::Config {
                message: "x".into()
            }
            .status_code(),
            500
        );
        assert_eq!(
            CopilotError::BadModelOutput { raw: "x".into() }.status_code(),
            502
        );
    }

    #[test]
    fn redaction_strips_secret_shaped_substrings() {
        let msg = redact("key sk-ABC123xyz and OPENAI_API_KEY=abc and OPENROUTER-foo leaked");
        assert!(!msg.contains("sk-ABC123xyz"));
        assert!(!msg.contains("OPENAI_API_KEY"));
        assert!(!msg.contains("OPENROUTER-foo"));
    }

    #[test]
    fn sanitized_message_applies_redaction() {
        let err = CopilotError::provider_error("openai", "bad key sk-abcdef123456");
        assert!(!err.sanitized_message().contains("sk-abcdef123456"));
    }

    proptest::proptest! {
        #[test]
        fn redaction_removes_any_generated_secret_shaped_substring(
            prefix in "sk|OPENAI|OPENROUTER",
            suffix in "[-_A-Za-z0-9]{1,20}",
        ) {
            let secret = format!("{prefix}{suffix}");
            let message = format!("error: {secret} is invalid");
            let cleaned = redact(&message);
            proptest::prop_assert!(!cleaned.contains(&secret));
        }
    }
}
