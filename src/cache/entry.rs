use time::{Duration, OffsetDateTime};

/// A cached value and the instant it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: OffsetDateTime,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, stored_at: OffsetDateTime) -> Self {
        Self { value, stored_at }
    }

    /// Fresh iff strictly less than `ttl` has elapsed since storage.
    pub fn is_fresh(&self, now: OffsetDateTime, ttl: Duration) -> bool {
        now - self.stored_at < ttl
    }
}

/// Counts reported by the administrative `stats` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    pub total_cached: usize,
    pub expired: usize,
}
