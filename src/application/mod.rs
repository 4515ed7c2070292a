//! Relay resources assembled from the generic cache and fetch components.
//!
//! Each service is a key namespace, a TTL, an endpoint and a response mapper
//! over [`crate::cache`] and [`crate::fetch`].

pub mod blocked;
pub mod context;
pub mod feed;
pub mod notifications;
pub mod profiles;
pub mod rates;

pub use blocked::BlockedPubkeyService;
pub use context::AdminContext;
pub use feed::Feed;
pub use notifications::{
    Moderation, NotificationKind, NotificationQuery, NotificationService, Payments, Reports,
};
pub use profiles::{PROFILE_FIELD, ProfileLookup, ProfileService};
pub use rates::{CoinGeckoRateSource, RateService, RateSource, RateSourceKind, RelayRateSource};
