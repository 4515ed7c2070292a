//! Wire types for the relay management API.
//!
//! These mirror the JSON shapes exchanged with the relay backend (and the
//! CoinGecko market-chart endpoint used as an alternate rate source). They
//! carry no behavior beyond (de)serialization and light accessors; mapping
//! into domain values happens in the `relay-admin` crate.

pub mod blocked;
pub mod notifications;
pub mod profiles;
pub mod rates;
pub mod reports;

pub use blocked::{BlockPubkeyRequest, BlockedPubkey, BlockedPubkeysResponse};
pub use notifications::{
    MarkAllReadRequest, MarkReadRequest, ModerationNotification, ModerationStats,
    NotificationFilter, NotificationPage, Pagination, PaymentNotification, PaymentStats,
    ReportNotification, ReportStats, TypeCount, UserCount,
};
pub use profiles::{Profile, ProfilesRequest, ProfilesResponse};
pub use rates::{BitcoinRate, MarketChart, RateValue};
pub use reports::ReportedEvent;
