#![deny(clippy::all, clippy::pedantic)]

pub mod auth;
pub mod blocked;
pub mod cache;
pub mod notifications;
pub mod profiles;
pub mod rates;
pub mod reports;
