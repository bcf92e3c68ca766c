//! Time-bounded query cache keyed by opaque strings.
//!
//! Entries are visible until their deadline passes. Writes elsewhere in the
//! system drop whole key families with [`QueryCache::invalidate_prefix`].

use std::{
    collections::HashMap,
    sync::{
        RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "perpus_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "perpus_cache_miss_total";
pub(crate) const METRIC_CACHE_INVALIDATED: &str = "perpus_cache_invalidated_total";
pub(crate) const METRIC_CACHE_EXPIRED: &str = "perpus_cache_expired_total";

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared key → value store with per-entry expiry.
///
/// Construct one per cached resource family and hand it to the components
/// that read or invalidate it; there is no process-wide instance.
///
/// Every invalidation advances a generation counter. A reader that snapshots
/// [`generation`](Self::generation) before computing a value and stores it
/// with [`put_if_unchanged`](Self::put_if_unchanged) never caches a value
/// computed before a concurrent invalidation.
pub struct QueryCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    generation: AtomicU64,
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> QueryCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    ///
    /// A deadline the clock cannot represent leaves the cache untouched.
    pub fn put(&self, key: String, value: V, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            debug!(key = %key, ttl_secs = ttl.as_secs(), "ttl overflows clock; not caching");
            return;
        };

        rw_write(&self.entries, SOURCE, "put").insert(key, CacheEntry { value, expires_at });
    }

    /// Like [`put`](Self::put), but only while no invalidation happened since
    /// `generation` was read. Returns whether the value was stored.
    pub fn put_if_unchanged(&self, key: String, value: V, ttl: Duration, generation: u64) -> bool {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            debug!(key = %key, ttl_secs = ttl.as_secs(), "ttl overflows clock; not caching");
            return false;
        };

        let mut entries = rw_write(&self.entries, SOURCE, "put_if_unchanged");
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(key = %key, "invalidated while computing; not caching");
            return false;
        }
        entries.insert(key, CacheEntry { value, expires_at });
        true
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// Returns how many entries were dropped, expired ones included.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate_prefix");
        self.generation.fetch_add(1, Ordering::AcqRel);
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            counter!(METRIC_CACHE_INVALIDATED).increment(removed as u64);
        }
        debug!(prefix, removed, "invalidated cache prefix");
        removed
    }

    /// Drop every entry whose deadline has passed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "purge_expired");
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            counter!(METRIC_CACHE_EXPIRED).increment(removed as u64);
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
    }
}

impl<V: Clone> QueryCache<V> {
    /// Return the live value for `key`.
    ///
    /// An expired entry reads as absent and is removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = rw_read(&self.entries, SOURCE, "get");
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    counter!(METRIC_CACHE_MISS).increment(1);
                    return None;
                }
            }
        }

        // Another writer may have refreshed the entry between the two locks.
        let mut entries = rw_write(&self.entries, SOURCE, "get_purge");
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
            counter!(METRIC_CACHE_EXPIRED).increment(1);
        }
        counter!(METRIC_CACHE_MISS).increment(1);
        None
    }
}
