//! Single-flight deduplication of concurrent identical-key work (§4.2).
//!
//! When two callers request the same key concurrently, only the first becomes
//! the *leader* and actually runs the producing future; every other caller
//! subscribes to the leader's result and receives a clone of it once the leader
//! finishes — success or failure alike (§4.2: "the first producer's exception is
//! the result observed by all current awaiters").

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use tokio::sync::broadcast;

/// Deduplicates concurrent calls for the same key so only one producer runs at
/// a time; all callers racing on that key observe the same `Result`.
pub struct SingleFlightMap<K, V, E> {
    inflight: Mutex<HashMap<K, broadcast::Sender<Result<V, E>>>>,
}

impl<K, V, E> Default for SingleFlightMap<K, V, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> SingleFlightMap<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `produce` for `key` unless another caller is already doing so, in
    /// which case wait for that caller's result instead. Both the leader and
    /// every follower get back the identical `Result`.
    pub async fn acquire<Fut>(&self, key: K, produce: Fut) -> Result<V, E>
    where
        Fut: Future<Output = Result<V, E>>,
    {
        let existing = {
            let mut guard = self.inflight.lock().expect("single-flight mutex poisoned");
            match guard.get(&key) {
                Some(tx) => Some(tx.subscribe()),
                None => {
                    let (tx, _rx) = broadcast::channel(1);
                    guard.insert(key.clone(), tx);
                    None
                }
            }
        };

        match existing {
            Some(mut rx) => loop {
                match rx.recv().await {
                    Ok(result) => return result,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        panic!("single-flight leader dropped without producing a result");
                    }
                }
            },
            None => {
                let result = produce.await;
                let mut guard = self.inflight.lock().expect("single-flight mutex poisoned");
                if let Some(tx) = guard.remove(&key) {
                    let _ = tx.send(result.clone());
                }
                result
            }
        }
    }

    /// Number of keys currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inflight.lock().expect("single-flight mutex poisoned").len()
    }
}
