//! copilot-middleware
//!
//! The two generic primitives shared by every cache in the Market Data Resolution
//! & Caching Layer and the LLM Invocation Layer — a TTL-bounded, FIFO-evicted
//! keyed store and a single-flight deduplication map (§4.1, §4.2) — plus the
//! Quota Gate that enforces per-user monthly limits against the external
//! `UsageStore` (§4.15).
#![warn(missing_docs)]

mod cache;
mod quota;
mod single_flight;

pub use cache::TtlLruCache;
pub use quota::QuotaGate;
pub use single_flight::SingleFlightMap;
