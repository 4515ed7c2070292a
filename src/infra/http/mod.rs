//! HTTP clients for the relay management API and CoinGecko.

mod client;
mod coingecko;
mod response;

pub use client::ApiClient;
pub use coingecko::CoinGeckoClient;
