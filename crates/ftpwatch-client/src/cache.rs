//! Shared client cache.
//!
//! Keys are logical connection names or resolved descriptors. Each key maps
//! to a `OnceCell`, so concurrent callers for the same key wait on a single
//! construction and all receive the same `Arc`. The map lock only guards the
//! cell lookup and is never held across a connect.

use crate::client::SharedClient;
use crate::error::FtpResult;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<SharedClient>>;

/// Concurrency-safe registry of shared clients.
#[derive(Default)]
pub struct ClientCache {
    slots: StdMutex<HashMap<String, Slot>>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the client cached under `key`, running `init` to create it
    /// when absent. `init` runs at most once per key at a time; when it
    /// fails the key stays empty and the error is returned to every waiter
    /// that was relying on that attempt.
    pub async fn get_or_try_insert<F, Fut>(&self, key: &str, init: F) -> FtpResult<SharedClient>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FtpResult<SharedClient>>,
    {
        let slot = self.slots().entry(key.to_string()).or_default().clone();
        let client = slot.get_or_try_init(init).await?;
        Ok(client.clone())
    }

    /// Cached client for `key`, if one has been created.
    pub fn get(&self, key: &str) -> Option<SharedClient> {
        self.slots().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Drop the entry for `key`. Holders of the client keep it alive; later
    /// lookups create a new one.
    pub fn evict(&self, key: &str) -> Option<SharedClient> {
        self.slots()
            .remove(key)
            .and_then(|slot| slot.get().cloned())
    }

    /// Remove every entry and return the clients that were cached.
    pub fn drain(&self) -> Vec<SharedClient> {
        self.slots()
            .drain()
            .filter_map(|(_, slot)| slot.get().cloned())
            .collect()
    }

    /// Number of keys holding a created client.
    pub fn len(&self) -> usize {
        self.slots().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FtpError;
    use crate::memory::InMemoryClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted(builds: &Arc<AtomicUsize>) -> impl Future<Output = FtpResult<SharedClient>> {
        let builds = builds.clone();
        async move {
            builds.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(Arc::new(InMemoryClient::new()) as SharedClient)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_instance() {
        let cache = Arc::new(ClientCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let builds = builds.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_insert("reports", || counted(&builds))
                    .await
                    .unwrap()
            }));
        }

        let mut clients = Vec::new();
        for h in handles {
            clients.push(h.await.unwrap());
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_get_distinct_clients() {
        let cache = ClientCache::new();
        let builds = Arc::new(AtomicUsize::new(0));
        let a = cache.get_or_try_insert("a", || counted(&builds)).await.unwrap();
        let b = cache.get_or_try_insert("b", || counted(&builds)).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_init_leaves_key_empty() {
        let cache = ClientCache::new();
        let err = cache
            .get_or_try_insert("flaky", || async {
                Err::<SharedClient, _>(FtpError::connection_failed("refused"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "refused");
        assert!(cache.is_empty());
        assert!(cache.get("flaky").is_none());

        let builds = Arc::new(AtomicUsize::new(0));
        cache.get_or_try_insert("flaky", || counted(&builds)).await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn evict_forces_recreation() {
        let cache = ClientCache::new();
        let builds = Arc::new(AtomicUsize::new(0));
        let first = cache.get_or_try_insert("k", || counted(&builds)).await.unwrap();
        let evicted = cache.evict("k").unwrap();
        assert!(Arc::ptr_eq(&first, &evicted));
        assert!(cache.is_empty());

        let second = cache.get_or_try_insert("k", || counted(&builds)).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.drain().len(), 1);
        assert!(cache.is_empty());
    }
}
