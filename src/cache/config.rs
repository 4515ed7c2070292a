//! Cache configuration.
//!
//! TTLs are fixed per cache instance; the values here are applied when
//! [`AdminContext`](crate::application::AdminContext) builds the caches.

use time::Duration;

const DEFAULT_RATES_TTL_SECS: i64 = 8 * 60;
const DEFAULT_PROFILES_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_PROFILE_PREFIX: &str = "profile_cache_";

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Lifetime of cached bitcoin rate series.
    pub rates_ttl: Duration,
    /// Lifetime of persisted subscriber profiles.
    pub profiles_ttl: Duration,
    /// Store key prefix for persisted profiles.
    pub profile_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            rates_ttl: Duration::seconds(DEFAULT_RATES_TTL_SECS),
            profiles_ttl: Duration::seconds(DEFAULT_PROFILES_TTL_SECS),
            profile_prefix: DEFAULT_PROFILE_PREFIX.to_string(),
        }
    }
}
