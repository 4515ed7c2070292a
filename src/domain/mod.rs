//! Validated values shared by the services.

pub mod error;
pub mod event_id;
pub mod pubkey;
pub mod rates;

pub use error::DomainError;
pub use event_id::EventId;
pub use pubkey::Pubkey;
pub use rates::RatePoint;
