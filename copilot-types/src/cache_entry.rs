//! The generic value wrapper stored by every TTL-LRU cache (§3, §4.1).

/// A cached value tagged with the monotonic-clock millisecond reading it was produced at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// Monotonic-clock milliseconds at insertion time.
    pub fetched_at: i64,
}

impl<V> CacheEntry<V> {
    /// Wrap a value with the given insertion timestamp.
    pub const fn new(value: V, fetched_at: i64) -> Self {
        Self { value, fetched_at }
    }

    /// Freshness predicate: `now - fetched_at < ttl_ms`. `ttl_ms` must be `> 0`.
    #[must_use]
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        debug_assert!(ttl_ms > 0, "TTL must be positive");
        now_ms.saturating_sub(self.fetched_at) < ttl_ms
    }
}
