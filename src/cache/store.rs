//! Process-memory expiring cache.
//!
//! Entries live for the lifetime of the owning instance. Staleness is decided
//! at read time; nothing is evicted in the background.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use metrics::counter;
use time::Duration;

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, CacheStats};
use super::lock::recover;

pub(crate) const METRIC_CACHE_HIT: &str = "relay_admin_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "relay_admin_cache_miss_total";
pub(crate) const METRIC_CACHE_EXPIRED: &str = "relay_admin_cache_expired_total";

/// Keyed cache with a fixed TTL held in process memory.
pub struct VolatileCache<K, V> {
    name: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> VolatileCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self::with_clock(name, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any. Stale entries are left in place.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = recover(self.entries.read(), self.name, "get");
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => {
                counter!(METRIC_CACHE_HIT, "cache" => self.name).increment(1);
                Some(entry.value.clone())
            }
            Some(_) => {
                counter!(METRIC_CACHE_EXPIRED, "cache" => self.name).increment(1);
                None
            }
            None => {
                counter!(METRIC_CACHE_MISS, "cache" => self.name).increment(1);
                None
            }
        }
    }

    /// The stored entry regardless of freshness.
    pub fn peek(&self, key: &K) -> Option<CacheEntry<V>> {
        recover(self.entries.read(), self.name, "peek").get(key).cloned()
    }

    /// Store `value`, replacing any previous entry for `key`.
    pub fn set(&self, key: K, value: V) {
        let entry = CacheEntry::new(value, self.clock.now());
        recover(self.entries.write(), self.name, "set").insert(key, entry);
    }

    /// Fresh subset of `keys`.
    pub fn get_many<'a, I>(&self, keys: I) -> HashMap<K, V>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter()
            .filter_map(|key| self.get(key).map(|value| (key.clone(), value)))
            .collect()
    }

    /// True when there is no entry or the entry is stale.
    pub fn is_expired(&self, key: &K) -> bool {
        let now = self.clock.now();
        recover(self.entries.read(), self.name, "is_expired")
            .get(key)
            .is_none_or(|entry| !entry.is_fresh(now, self.ttl))
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        recover(self.entries.write(), self.name, "remove")
            .remove(key)
            .map(|entry| entry.value)
    }

    pub fn clear(&self) {
        recover(self.entries.write(), self.name, "clear").clear();
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = recover(self.entries.read(), self.name, "stats");
        CacheStats {
            total_cached: entries.len(),
            expired: entries
                .values()
                .filter(|entry| !entry.is_fresh(now, self.ttl))
                .count(),
        }
    }

    /// Drop stale entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = recover(self.entries.write(), self.name, "sweep");
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, self.ttl));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        recover(self.entries.read(), self.name, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
