//! copilot-core
//!
//! Error taxonomy, external collaborator traits, and the clock / rate-limit
//! primitives shared by every orchestrator in the portfolio copilot backend.
//!
//! - `error`: the unified [`CopilotError`] taxonomy (§7, §10.2).
//! - `collaborators`: the narrow external collaborator traits the core depends on
//!   instead of a database or web framework (§10.3).
//! - `clock`: monotonic `now_ms` and UTC day bucketing (§2 Clock & Time).
//! - `rate_limit`: the process-wide `rateLimitedUntil` scalar (§3, §9).
#![warn(missing_docs)]

pub mod clock;
pub mod collaborators;
pub mod error;
pub mod rate_limit;

pub use clock::Clock;
pub use collaborators::{CurrentUser, FetchOptions, HttpFetcher, TierLimits, UsageStore};
pub use error::CopilotError;
pub use rate_limit::RateLimitGate;
