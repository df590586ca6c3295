//! Scriptable test doubles for every collaborator trait the `copilot` crate
//! consumes: [`HttpFetcher`](copilot_core::HttpFetcher),
//! [`UsageStore`](copilot_core::UsageStore), [`TierLimits`](copilot_core::TierLimits),
//! [`CurrentUser`](copilot_core::CurrentUser), and
//! [`LlmProvider`](copilot_providers::LlmProvider). Each double follows the same
//! shape: a per-key or sequential queue of scripted outcomes plus a handle that
//! lets a test script new outcomes in after construction.
#![warn(missing_docs)]

/// A scriptable [`HttpFetcher`](copilot_core::HttpFetcher) keyed by URL substring.
pub mod http_fetcher;
/// A scriptable [`LlmProvider`](copilot_providers::LlmProvider).
pub mod llm_provider;
/// In-memory [`UsageStore`](copilot_core::UsageStore)/[`TierLimits`](copilot_core::TierLimits)/
/// [`CurrentUser`](copilot_core::CurrentUser) doubles.
pub mod usage;

pub use http_fetcher::{MockHttpFetcher, MockHttpFetcherController};
pub use llm_provider::{MockLlmProvider, MockLlmProviderController};
pub use usage::{FixedTierLimits, InMemoryUsageStore, StaticUser};

/// A scripted outcome for one invocation of a mocked collaborator method:
/// succeed with a value, fail with an error, or hang forever (to exercise
/// deadline/timeout handling in a caller).
#[derive(Debug, Clone)]
pub enum MockBehavior<T, E> {
    /// Resolve immediately with `T`.
    Return(T),
    /// Resolve immediately with `E`.
    Fail(E),
    /// Never resolve. Callers relying on an external deadline (e.g.
    /// [`copilot_core::FetchOptions::deadline_ms`]) will time out against it.
    Hang,
}
