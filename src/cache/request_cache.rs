//! Request cache with in-flight coalescing
//!
//! Sits in front of read-only lookups (typeahead search, option lists)
//! and keeps identical requests from reaching the collaborator more than
//! once per freshness window:
//!
//! - a pending request for a key is shared by every caller asking for it
//! - a completed result younger than the TTL is returned directly
//! - failures are broadcast to the waiters but never cached
//!
//! The producer runs on its own task, so a caller that goes away does not
//! cancel work other callers are waiting on. The coalesce timeout is
//! enforced once on that task, so every waiter sees the same outcome.
//! Expired results are swept whenever a new producer starts, and the map
//! never holds more than `max_entries` completed results.

use crate::config::CacheConfig;
use crate::error::{Result, SyncError};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Cache slot for one key
enum Slot<V> {
    /// Producer running; waiters subscribe to `sender`
    Pending {
        sender: broadcast::Sender<Result<V>>,
        generation: u64,
    },
    /// Completed result
    Ready { value: V, stored_at: Instant },
}

/// Outcome of inspecting a slot under the lock
enum Lookup<V> {
    Hit(V),
    Join(broadcast::Receiver<Result<V>>),
    Miss,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
    generation: AtomicU64,
}

/// Snapshot of cache activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a fresh completed entry
    pub hits: u64,
    /// Lookups that started a producer
    pub misses: u64,
    /// Lookups that joined a pending producer
    pub coalesced: u64,
    /// Producers that failed or panicked
    pub failures: u64,
    /// Completed entries currently held (fresh or not yet evicted)
    pub ready_entries: usize,
    /// Producers currently running
    pub in_flight: usize,
}

/// TTL cache with in-flight request coalescing
///
/// # Example
///
/// ```rust,ignore
/// use didhub_sync::{cache::RequestCache, config::CacheConfig};
///
/// let cache = RequestCache::new(CacheConfig::for_typeahead());
///
/// // Concurrent identical lookups share one call to `search`
/// let results = cache
///     .fetch("alters:ash", move || async move { search("alters", "ash").await })
///     .await?;
/// ```
pub struct RequestCache<V> {
    config: CacheConfig,
    entries: Arc<Mutex<HashMap<String, Slot<V>>>>,
    counters: Arc<Counters>,
}

impl<V> Clone for RequestCache<V> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            entries: Arc::clone(&self.entries),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<V> RequestCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache; the TTL is fixed for its lifetime
    pub fn new(config: CacheConfig) -> Self {
        debug!(
            ttl_ms = config.ttl.as_millis() as u64,
            coalesce_timeout_ms = config.coalesce_timeout.as_millis() as u64,
            max_entries = config.max_entries,
            "RequestCache initialized"
        );
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the value for `key`, invoking `producer` only when needed
    ///
    /// The producer is called at most once per miss. Callers that arrive
    /// while it runs wait for the same result instead of calling it again.
    pub async fn fetch<F, Fut>(&self, key: &str, producer: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let mut receiver = {
            let mut entries = self.entries.lock().await;
            let lookup = match entries.get(key) {
                Some(Slot::Pending { sender, .. }) => Lookup::Join(sender.subscribe()),
                Some(Slot::Ready { value, stored_at })
                    if stored_at.elapsed() < self.config.ttl =>
                {
                    Lookup::Hit(value.clone())
                }
                _ => Lookup::Miss,
            };

            match lookup {
                Lookup::Hit(value) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Lookup::Join(receiver) => {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(key = key, "Joining in-flight request");
                    receiver
                }
                Lookup::Miss => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    make_room(&mut entries, &self.config);
                    let generation = self.counters.generation.fetch_add(1, Ordering::Relaxed);
                    let (sender, receiver) = broadcast::channel(1);
                    entries.insert(
                        key.to_string(),
                        Slot::Pending {
                            sender: sender.clone(),
                            generation,
                        },
                    );
                    self.spawn_producer(key.to_string(), generation, sender, producer());
                    receiver
                }
            }
        };

        match receiver.recv().await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Producer(format!(
                "request for {key} ended without a result"
            ))),
        }
    }

    fn spawn_producer<Fut>(
        &self,
        key: String,
        generation: u64,
        sender: broadcast::Sender<Result<V>>,
        fut: Fut,
    ) where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let counters = Arc::clone(&self.counters);
        let deadline = self.config.coalesce_timeout;

        tokio::spawn(async move {
            let result =
                match tokio::time::timeout(deadline, AssertUnwindSafe(fut).catch_unwind()).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(SyncError::Producer(format!("producer for {key} panicked"))),
                    Err(_) => Err(SyncError::Network(format!("request for {key} timed out"))),
                };

            let mut entries = entries.lock().await;
            // The slot may have been invalidated or replaced while we ran
            let still_ours = matches!(
                entries.get(&key),
                Some(Slot::Pending { generation: g, .. }) if *g == generation
            );

            match &result {
                Ok(value) if still_ours => {
                    entries.insert(
                        key.clone(),
                        Slot::Ready {
                            value: value.clone(),
                            stored_at: Instant::now(),
                        },
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %e, "Cached request failed, not caching");
                    if still_ours {
                        entries.remove(&key);
                    }
                }
            }

            debug!(
                key = %key,
                waiting = sender.receiver_count(),
                success = result.is_ok(),
                "Completing request"
            );
            // Receivers may have given up; nothing to do then
            let _ = sender.send(result);
        });
    }

    /// Fresh completed value for `key`, without producing
    pub async fn get_fresh(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(Slot::Ready { value, stored_at }) if stored_at.elapsed() < self.config.ttl => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    /// Drop the entry for `key`
    ///
    /// Waiters on a pending producer still receive its result, but it is
    /// not stored.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().await.remove(key).is_some()
    }

    /// Drop every entry whose key starts with `prefix`
    ///
    /// An empty prefix is ignored; use [`clear`](Self::clear) for that.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        if prefix.is_empty() {
            return 0;
        }
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    /// Drop everything
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Evict expired results
    ///
    /// Running producers are left alone; they end on their own deadline.
    pub async fn purge_expired(&self) -> usize {
        let ttl = self.config.ttl;
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, slot| match slot {
            Slot::Ready { stored_at, .. } => stored_at.elapsed() < ttl,
            Slot::Pending { .. } => true,
        });
        before - entries.len()
    }

    /// Number of producers currently running
    pub async fn in_flight_count(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|slot| matches!(slot, Slot::Pending { .. }))
            .count()
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        let in_flight = entries
            .values()
            .filter(|slot| matches!(slot, Slot::Pending { .. }))
            .count();

        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            ready_entries: entries.len() - in_flight,
            in_flight,
        }
    }
}

/// Drop expired results, then the oldest ones while at capacity
///
/// Pending slots are never evicted; their producers own them.
fn make_room<V>(entries: &mut HashMap<String, Slot<V>>, config: &CacheConfig) {
    let ttl = config.ttl;
    entries.retain(|_, slot| match slot {
        Slot::Ready { stored_at, .. } => stored_at.elapsed() < ttl,
        Slot::Pending { .. } => true,
    });

    let mut ready: Vec<(Instant, String)> = entries
        .iter()
        .filter_map(|(key, slot)| match slot {
            Slot::Ready { stored_at, .. } => Some((*stored_at, key.clone())),
            Slot::Pending { .. } => None,
        })
        .collect();
    if ready.len() < config.max_entries {
        return;
    }

    ready.sort();
    let excess = ready.len() + 1 - config.max_entries;
    for (_, key) in ready.into_iter().take(excess) {
        entries.remove(&key);
    }
    debug!(evicted = excess, max_entries = config.max_entries, "Request cache at capacity");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_producer(
        calls: &Arc<AtomicUsize>,
        value: &'static str,
        delay: Duration,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<String>> + Send>> {
        let calls = Arc::clone(calls);
        move || {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok(value.to_string())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesces_concurrent_callers() {
        let cache = RequestCache::<String>::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));

        let fetches = (0..5).map(|_| {
            cache.fetch(
                "alters:ash",
                counting_producer(&calls, "result", Duration::from_millis(50)),
            )
        });
        let results = futures::future::join_all(fetches).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), "result");
        }

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.coalesced, 4);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.ready_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_hit_and_expiry() {
        let cache = RequestCache::new(CacheConfig::default().with_ttl(Duration::from_secs(5)));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .fetch("k", counting_producer(&calls, "v1", Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(first, "v1");

        tokio::time::advance(Duration::from_secs(4)).await;
        let hit = cache
            .fetch("k", counting_producer(&calls, "v2", Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(hit, "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get_fresh("k").await.is_none());
        let refreshed = cache
            .fetch("k", counting_producer(&calls, "v2", Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(refreshed, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_not_cached() {
        let cache = RequestCache::<String>::with_defaults();

        let err = cache
            .fetch("k", || async { Err(SyncError::Network("down".into())) })
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::Network("down".into()));
        assert_eq!(cache.in_flight_count().await, 0);

        let ok = cache
            .fetch("k", || async { Ok("back".to_string()) })
            .await
            .unwrap();
        assert_eq!(ok, "back");
        assert_eq!(cache.stats().await.failures, 1);
    }

    fn explode() -> Result<String> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_producer_reports_failure() {
        let cache = RequestCache::<String>::with_defaults();
        let err = cache
            .fetch("k", || async { explode() })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Producer(_)));
        assert_eq!(cache.in_flight_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_joiner_sees_same_timeout() {
        let cache = RequestCache::<String>::new(CacheConfig {
            coalesce_timeout: Duration::from_secs(10),
            ..CacheConfig::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let early = {
            let cache = cache.clone();
            let producer = counting_producer(&calls, "v", Duration::from_secs(12));
            tokio::spawn(async move { cache.fetch("k", producer).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        let late = cache
            .fetch("k", counting_producer(&calls, "other", Duration::ZERO))
            .await;
        let early = early.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(early, late);
        assert!(matches!(late, Err(SyncError::Network(_))));

        // Timed out work is not cached; the next call produces again
        assert_eq!(cache.in_flight_count().await, 0);
        let retried = cache
            .fetch("k", counting_producer(&calls, "v2", Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(retried, "v2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_joiner_shares_slow_success() {
        let cache = RequestCache::<String>::new(CacheConfig {
            coalesce_timeout: Duration::from_secs(10),
            ..CacheConfig::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let early = {
            let cache = cache.clone();
            let producer = counting_producer(&calls, "v", Duration::from_secs(8));
            tokio::spawn(async move { cache.fetch("k", producer).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        let late = cache
            .fetch("k", counting_producer(&calls, "other", Duration::ZERO))
            .await;

        assert_eq!(early.await.unwrap(), Ok("v".to_string()));
        assert_eq!(late, Ok("v".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_keys_do_not_pile_up() {
        let cache = RequestCache::<String>::new(
            CacheConfig::for_typeahead().with_ttl(Duration::from_secs(5)),
        );
        for i in 0..1000 {
            let key = format!("alters:{i}");
            cache
                .fetch(&key, move || async move { Ok(format!("hit {i}")) })
                .await
                .unwrap();
        }

        tokio::time::advance(Duration::from_secs(3600)).await;
        cache
            .fetch("alters:new", || async { Ok("fresh".to_string()) })
            .await
            .unwrap();

        assert_eq!(cache.stats().await.ready_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let cache = RequestCache::<u32>::new(CacheConfig {
            max_entries: 3,
            ..CacheConfig::default()
        });
        for (n, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            cache.fetch(key, move || async move { Ok(n as u32) }).await.unwrap();
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        assert_eq!(cache.stats().await.ready_entries, 3);
        assert!(cache.get_fresh("a").await.is_none());
        assert_eq!(cache.get_fresh("d").await, Some(3));
    }

    #[tokio::test]
    async fn test_invalidate_prefix() {
        let cache = RequestCache::<String>::with_defaults();
        for key in ["alters:a", "alters:b", "users:a"] {
            cache
                .fetch(key, move || async move { Ok(key.to_string()) })
                .await
                .unwrap();
        }

        assert_eq!(cache.invalidate_prefix("").await, 0);
        assert_eq!(cache.invalidate_prefix("alters:").await, 2);
        assert!(cache.get_fresh("users:a").await.is_some());
        assert!(cache.invalidate("users:a").await);
        assert!(!cache.invalidate("users:a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = RequestCache::new(CacheConfig::default().with_ttl(Duration::from_secs(1)));
        cache.fetch("a", || async { Ok(1u32) }).await.unwrap();
        cache.fetch("b", || async { Ok(2u32) }).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired().await, 2);
        assert_eq!(cache.stats().await.ready_entries, 0);
    }
}
