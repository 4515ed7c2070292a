//! Data-access layer for administering a Nostr relay.
//!
//! The crate is organised bottom-up:
//!
//! - [`cache`]: expiring caches (volatile and persistent) and the key-value
//!   stores behind them
//! - [`fetch`]: request coalescing, retry, polling and the view-model that
//!   consumers observe
//! - [`session`]: bearer-token ownership and session invalidation
//! - [`infra`]: HTTP clients, telemetry and startup errors
//! - [`application`]: the relay resources (rates, profiles, notification
//!   feeds, blocked pubkeys) built from the pieces above
//!
//! [`application::AdminContext`] is the single place where long-lived
//! instances are constructed.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod fetch;
pub mod infra;
pub mod session;

pub use relay_admin_api_types as api_types;
