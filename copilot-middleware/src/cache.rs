//! The generic TTL-LRU cache (§4.1).
//!
//! Bounded by `max_entries`; eviction on `put` removes the *oldest-inserted* key
//! first (FIFO — this is LRU-by-insertion-order and is explicit: `get` never
//! updates recency). Freshness is a separate concern evaluated by callers against
//! a configured TTL via [`TtlLruCache::get_fresh`]. A single mutex guards the
//! whole structure; every operation is O(1) amortised so lock hold times stay
//! bounded under a parallel-threaded runtime.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

use copilot_types::CacheEntry;

struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    order: VecDeque<K>,
    max_entries: usize,
}

/// A keyed store of [`CacheEntry`] values bounded by `max_entries`, evicting the
/// oldest-inserted key on overflow.
pub struct TtlLruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache bounded at `max_entries` (must be `> 0`).
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        assert!(max_entries > 0, "max_entries must be positive");
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                max_entries,
            }),
        }
    }

    /// Fetch the raw entry for `key`, regardless of freshness.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<CacheEntry<V>> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.get(key).cloned()
    }

    /// Fetch `key`'s value only if it is fresh as of `now_ms` under `ttl_ms`.
    #[must_use]
    pub fn get_fresh(&self, key: &K, now_ms: i64, ttl_ms: i64) -> Option<V> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        let entry = inner.entries.get(key)?;
        entry.is_fresh(now_ms, ttl_ms).then(|| entry.value.clone())
    }

    /// Insert or refresh `key`. Re-inserting an existing key updates its value and
    /// `fetched_at` but does not change its position in the eviction order — the
    /// policy evicts by original insertion order, not by last-write time.
    pub fn put(&self, key: K, value: V, now_ms: i64) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let entry = CacheEntry::new(value, now_ms);
        if inner.entries.insert(key.clone(), entry).is_none() {
            inner.order.push_back(key);
        }
        while inner.entries.len() > inner.max_entries {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Current number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").entries.len()
    }

    /// True if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundedness_evicts_oldest_inserted_on_overflow() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(2);
        cache.put("a", 1, 0);
        cache.put("b", 2, 1);
        cache.put("c", 3, 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&"a").is_none());
        assert!(cache.get(&"b").is_some());
        assert!(cache.get(&"c").is_some());
    }

    #[test]
    fn get_does_not_refresh_eviction_order() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(2);
        cache.put("a", 1, 0);
        cache.put("b", 2, 1);
        // Accessing "a" must not protect it from FIFO eviction (no LRU-by-recency).
        assert!(cache.get(&"a").is_some());
        cache.put("c", 3, 2);
        assert!(cache.get(&"a").is_none());
        assert!(cache.get(&"c").is_some());
    }

    #[test]
    fn re_put_of_existing_key_does_not_change_eviction_order() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(2);
        cache.put("a", 1, 0);
        cache.put("b", 2, 1);
        cache.put("a", 10, 5); // refresh, should stay oldest in order
        cache.put("c", 3, 6);
        assert!(cache.get(&"a").is_none());
        assert!(cache.get(&"b").is_some());
        assert_eq!(cache.get(&"c").unwrap().value, 3);
    }

    #[test]
    fn freshness_respects_ttl() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(10);
        cache.put("a", 1, 1_000);
        assert_eq!(cache.get_fresh(&"a", 1_050, 100), Some(1));
        assert_eq!(cache.get_fresh(&"a", 1_100, 100), None);
    }

    proptest::proptest! {
        #[test]
        fn boundedness_holds_for_arbitrary_put_sequences(
            keys in proptest::collection::vec(0u32..20, 1..200),
            max_entries in 1usize..10,
        ) {
            let cache: TtlLruCache<u32, u32> = TtlLruCache::new(max_entries);
            for (i, k) in keys.into_iter().enumerate() {
                cache.put(k, k, i as i64);
                proptest::prop_assert!(cache.len() <= max_entries);
            }
        }
    }
}
