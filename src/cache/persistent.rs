//! Expiring cache persisted through a [`KeyValueStore`].
//!
//! Each logical key maps to one store entry named `<prefix><key>` holding a
//! JSON record `{"<field>": <value>, "timestamp": <unix millis>}`. Expired
//! records are removed when read so the store does not grow without bound.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};
use tracing::warn;

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, CacheStats};
use super::kv::{KeyValueStore, StoreError};
use super::store::{METRIC_CACHE_EXPIRED, METRIC_CACHE_HIT, METRIC_CACHE_MISS};

const TIMESTAMP_FIELD: &str = "timestamp";

pub struct PersistentCache<V> {
    name: &'static str,
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    field: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    _value: PhantomData<fn() -> V>,
}

impl<V> PersistentCache<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(
        name: &'static str,
        store: Arc<dyn KeyValueStore>,
        prefix: impl Into<String>,
        field: &'static str,
        ttl: Duration,
    ) -> Self {
        Self::with_clock(name, store, prefix, field, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        name: &'static str,
        store: Arc<dyn KeyValueStore>,
        prefix: impl Into<String>,
        field: &'static str,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name,
            store,
            prefix: prefix.into(),
            field,
            ttl,
            clock,
            _value: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Fresh value for `key`. Expired or unreadable records are deleted.
    pub fn get(&self, key: &str) -> Option<V> {
        let storage_key = self.storage_key(key);
        let Some(entry) = self.read_entry(&storage_key) else {
            counter!(METRIC_CACHE_MISS, "cache" => self.name).increment(1);
            return None;
        };

        if entry.is_fresh(self.clock.now(), self.ttl) {
            counter!(METRIC_CACHE_HIT, "cache" => self.name).increment(1);
            return Some(entry.value);
        }

        counter!(METRIC_CACHE_EXPIRED, "cache" => self.name).increment(1);
        self.discard(&storage_key, "expired");
        None
    }

    /// Whether `key` is absent or stale. Never modifies the store.
    pub fn is_expired(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.read_entry(&self.storage_key(key))
            .is_none_or(|entry| !entry.is_fresh(now, self.ttl))
    }

    /// Store `value` under `key`. A value that cannot be represented as JSON
    /// is reported and nothing is written.
    pub fn set(&self, key: &str, value: &V) -> Result<(), StoreError> {
        let record = self.encode(value, self.clock.now())?;
        self.store.set(&self.storage_key(key), &record)
    }

    /// Fresh subset of `keys`, keyed by the logical (unprefixed) key.
    pub fn get_many<'a, I>(&self, keys: I) -> HashMap<String, V>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.store.remove(&self.storage_key(key))
    }

    /// Remove every entry under this cache's prefix, returning the count.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let keys = self.own_keys()?;
        for key in &keys {
            self.store.remove(key)?;
        }
        Ok(keys.len())
    }

    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        let now = self.clock.now();
        let keys = self.own_keys()?;
        let expired = keys
            .iter()
            .filter(|key| {
                self.read_entry(key)
                    .is_none_or(|entry| !entry.is_fresh(now, self.ttl))
            })
            .count();
        Ok(CacheStats {
            total_cached: keys.len(),
            expired,
        })
    }

    /// Remove expired and unreadable entries, returning the count.
    pub fn sweep(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut removed = 0;
        for key in self.own_keys()? {
            let stale = self
                .read_entry(&key)
                .is_none_or(|entry| !entry.is_fresh(now, self.ttl));
            if stale {
                self.store.remove(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn own_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(&self.prefix))
            .collect())
    }

    fn read_entry(&self, storage_key: &str) -> Option<CacheEntry<V>> {
        let raw = match self.store.get(storage_key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(cache = self.name, key = storage_key, error = %err, "cache read failed");
                return None;
            }
        };

        match self.decode(&raw) {
            Some(entry) => Some(entry),
            None => {
                self.discard(storage_key, "undecodable");
                None
            }
        }
    }

    fn discard(&self, storage_key: &str, reason: &'static str) {
        if let Err(err) = self.store.remove(storage_key) {
            warn!(
                cache = self.name,
                key = storage_key,
                reason,
                error = %err,
                "failed to discard cache entry"
            );
        }
    }

    fn encode(&self, value: &V, stored_at: OffsetDateTime) -> Result<String, StoreError> {
        let millis = i64::try_from(stored_at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX);
        let mut record = Map::new();
        record.insert(self.field.to_string(), serde_json::to_value(value)?);
        record.insert(TIMESTAMP_FIELD.to_string(), Value::from(millis));
        Ok(Value::Object(record).to_string())
    }

    fn decode(&self, raw: &str) -> Option<CacheEntry<V>> {
        let Value::Object(mut record) = serde_json::from_str::<Value>(raw).ok()? else {
            return None;
        };
        let millis = record.get(TIMESTAMP_FIELD)?.as_i64()?;
        let stored_at =
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()?;
        let value = serde_json::from_value(record.remove(self.field)?).ok()?;
        Some(CacheEntry::new(value, stored_at))
    }
}
