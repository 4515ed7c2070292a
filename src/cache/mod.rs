//! Expiring caches for relay data.
//!
//! Two instantiations share one freshness rule (`now - stored_at < ttl`,
//! evaluated lazily at read time):
//!
//! - [`VolatileCache`]: process memory, gone on restart (bitcoin rates)
//! - [`PersistentCache`]: JSON records in a [`KeyValueStore`], namespaced by
//!   a key prefix (subscriber profiles)

mod clock;
mod config;
mod entry;
pub mod kv;
mod lock;
mod persistent;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use entry::{CacheEntry, CacheStats};
pub use kv::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use persistent::PersistentCache;
pub use store::VolatileCache;
