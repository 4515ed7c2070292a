#![deny(clippy::all, clippy::pedantic)]

use relay_admin::cache::StoreError;
use relay_admin::config::LoadError;
use relay_admin::fetch::FetchError;
use relay_admin::infra::InfraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Settings(#[from] LoadError),
    #[error("startup error: {0}")]
    Infra(#[from] InfraError),
    #[error("request failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("local store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to read token file {path}: {source}")]
    TokenFile {
        path: String,
        source: std::io::Error,
    },
    #[error("token is required (use --token-file or RELAY_ADMIN_TOKEN)")]
    MissingToken,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
    #[error("session ended; run `relay-admin auth login` again")]
    SessionEnded,
    #[error("failed to listen for ctrl-c: {0}")]
    Signal(std::io::Error),
}
