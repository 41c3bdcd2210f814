//! In-process response cache with TTL expiry and a lazily enforced size bound.
//!
//! [`ResponseCache`] maps the exact request text to a previously computed
//! response. Entries carry the instant they were inserted; a lookup treats any
//! entry older than the TTL as a miss. Expired entries stay in the map until a
//! sweep removes them, and a sweep runs synchronously inside [`ResponseCache::put`]
//! whenever the map grows past `max_size`.
//!
//! ## Eviction
//!
//! | Policy                          | Effect of a sweep                                   |
//! |---------------------------------|-----------------------------------------------------|
//! | [`EvictionPolicy::ExpiredOnly`] | drops expired entries; fresh entries are never evicted |
//! | [`EvictionPolicy::OldestFirst`] | same, then drops the oldest entries down to `max_size` |
//!
//! With the default `ExpiredOnly` the bound is a sweep trigger, not a hard cap:
//! `max_size + 1` fresh entries stay `max_size + 1` entries.
//!
//! The cache never fails. All operations take a short, non-poisoning lock that is
//! released before returning, so callers can hold a `ResponseCache` across
//! `.await` points and consult it before and after an upstream call without
//! ever holding the lock during that call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live for cached entries (one hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default number of entries above which `put` triggers a sweep.
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// What a sweep is allowed to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Remove only entries older than the TTL. The store may stay over `max_size`.
    #[default]
    ExpiredOnly,
    /// After removing expired entries, remove the oldest-inserted entries until
    /// the store holds exactly `max_size`.
    OldestFirst,
}

/// Construction parameters for a [`ResponseCache`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use promptcache::cache::{CacheConfig, EvictionPolicy};
///
/// let config = CacheConfig::default()
///     .ttl(Duration::from_secs(60))
///     .max_size(10)
///     .eviction(EvictionPolicy::OldestFirst);
/// assert_eq!(config.max_size, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_size: usize,
    pub eviction: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
            eviction: EvictionPolicy::default(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }
}

/// Point-in-time counters for a [`ResponseCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries physically stored, including expired ones not yet swept.
    pub entries: usize,
    /// Lookups that returned a value.
    pub hits: u64,
    /// Lookups that found nothing or only a stale entry.
    pub misses: u64,
    /// Entries removed by sweeps since construction.
    pub evictions: u64,
}

// A stored value and the instant it was (last) inserted.
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Time- and size-bounded map from request text to response.
///
/// One instance is meant to live for the whole process, owned by the service
/// state and shared by reference. The key is the request text exactly as given:
/// no case folding and no whitespace trimming.
///
/// # Examples
///
/// ```
/// use promptcache::cache::{CacheConfig, ResponseCache};
///
/// let cache = ResponseCache::new(CacheConfig::default());
/// assert_eq!(cache.get("q"), None::<String>);
///
/// cache.put("q", "a".to_string());
/// assert_eq!(cache.get("q").as_deref(), Some("a"));
/// ```
#[derive(Debug)]
pub struct ResponseCache<V> {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Creates an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        debug!(
            ttl_secs = config.ttl.as_secs(),
            max_size = config.max_size,
            eviction = ?config.eviction,
            "creating response cache"
        );
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Inserts or overwrites the entry for `key`, stamping it with the current time.
    ///
    /// If the store then holds more than `max_size` entries, a sweep runs before
    /// this method returns.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let replaced = entries
            .insert(
                key,
                CacheEntry {
                    value,
                    inserted_at: now,
                },
            )
            .is_some();
        debug!(replaced, size = entries.len(), "cache put");

        if entries.len() > self.config.max_size {
            let removed = self.sweep_locked(&mut entries, now);
            debug!(
                removed,
                size = entries.len(),
                max_size = self.config.max_size,
                "size bound exceeded, swept"
            );
        }
    }

    /// Returns a clone of the value for `key` if present and not older than the TTL.
    ///
    /// A stale entry is reported as a miss but left in place; only a sweep removes
    /// it. Reads never move an entry's timestamp.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now, self.config.ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("cache miss (stale entry)");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("cache miss");
                None
            }
        }
    }

    /// Removes every entry older than the TTL and returns how many were removed.
    ///
    /// Under [`EvictionPolicy::OldestFirst`] this also trims the oldest entries
    /// until the store is back within `max_size`.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        self.sweep_locked(&mut entries, now)
    }

    /// Number of entries physically stored, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// `true` when nothing is stored, stale or fresh.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of the entry count and the lifetime hit, miss and eviction counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn sweep_locked(&self, entries: &mut HashMap<String, CacheEntry<V>>, now: Instant) -> usize {
        let before = entries.len();
        let ttl = self.config.ttl;
        entries.retain(|_, entry| !entry.is_expired(now, ttl));

        if self.config.eviction == EvictionPolicy::OldestFirst
            && entries.len() > self.config.max_size
        {
            let excess = entries.len() - self.config.max_size;
            let mut by_age: Vec<(Instant, String)> = entries
                .iter()
                .map(|(key, entry)| (entry.inserted_at, key.clone()))
                .collect();
            by_age.sort_unstable();
            for (_, key) in by_age.into_iter().take(excess) {
                entries.remove(&key);
            }
        }

        let removed = before - entries.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(ttl_secs: u64, max_size: usize) -> ResponseCache<String> {
        ResponseCache::new(
            CacheConfig::default()
                .ttl(Duration::from_secs(ttl_secs))
                .max_size(max_size),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn miss_then_hit() {
        let cache = cache_with(3600, 1000);
        assert_eq!(cache.get("q"), None);
        cache.put("q", "a".to_string());
        assert_eq!(cache.get("q").as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_exact_match() {
        let cache = cache_with(3600, 1000);
        cache.put("Hello", "a".to_string());
        assert_eq!(cache.get("hello"), None);
        assert_eq!(cache.get("Hello "), None);
        assert_eq!(cache.get("Hello").as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_a_miss_but_stays_until_swept() {
        let cache = cache_with(1, 1000);
        cache.put("q", "a".to_string());

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(cache.get("q"), None);
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_at_exactly_ttl_is_still_fresh() {
        let cache = cache_with(1, 1000);
        cache.put("q", "a".to_string());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("q").as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn put_over_bound_sweeps_expired_entries() {
        let cache = cache_with(1, 2);
        cache.put("old-1", "x".to_string());
        cache.put("old-2", "x".to_string());
        tokio::time::advance(Duration::from_secs(2)).await;

        cache.put("new", "y".to_string());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new").as_deref(), Some("y"));
    }

    #[tokio::test(start_paused = true)]
    async fn put_within_bound_does_not_sweep() {
        let cache = cache_with(1, 10);
        cache.put("old", "x".to_string());
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.put("new", "y".to_string());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reads_do_not_refresh_expiry() {
        let cache = cache_with(2, 1000);
        cache.put("q", "a".to_string());
        for _ in 0..3 {
            tokio::time::advance(Duration::from_millis(600)).await;
            assert_eq!(cache.get("q").as_deref(), Some("a"));
        }
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(cache.get("q"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entries_over_bound_are_kept() {
        let cache = cache_with(3600, 5);
        for i in 0..6 {
            cache.put(format!("k{i}"), format!("v{i}"));
        }
        assert_eq!(cache.len(), 6);
        for i in 0..6 {
            assert!(cache.get(&format!("k{i}")).is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_replaces_value_and_timestamp() {
        let cache = cache_with(2, 1000);
        cache.put("q", "a".to_string());
        tokio::time::advance(Duration::from_millis(1500)).await;
        cache.put("q", "b".to_string());
        tokio::time::advance(Duration::from_millis(1500)).await;

        // 3s after the first put, 1.5s after the second.
        assert_eq!(cache.get("q").as_deref(), Some("b"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_first_trims_to_max_size() {
        let cache = ResponseCache::new(
            CacheConfig::default()
                .max_size(3)
                .eviction(EvictionPolicy::OldestFirst),
        );
        for i in 0..4 {
            cache.put(format!("k{i}"), i);
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("k0"), None);
        assert_eq!(cache.get("k3"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_first_prefers_expired_entries() {
        let cache = ResponseCache::new(
            CacheConfig::default()
                .ttl(Duration::from_secs(1))
                .max_size(2)
                .eviction(EvictionPolicy::OldestFirst),
        );
        cache.put("stale", 0);
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_track_hits_misses_and_evictions() {
        let cache = cache_with(1, 1);
        cache.put("a", "1".to_string());
        let _ = cache.get("a");
        let _ = cache.get("missing");
        tokio::time::advance(Duration::from_secs(2)).await;
        let _ = cache.get("a");
        cache.put("b", "2".to_string());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.max_size, 1000);
        assert_eq!(config.eviction, EvictionPolicy::ExpiredOnly);
    }

    #[test]
    fn shared_across_threads() {
        let cache = std::sync::Arc::new(ResponseCache::<u32>::default());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = std::sync::Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.put(format!("{t}-{i}"), i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 200);
    }
}
