use thiserror::Error;

use crate::cache::StoreError;
use crate::config::LoadError;

/// Startup failures: anything that prevents building an
/// [`AdminContext`](crate::application::AdminContext).
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error(transparent)]
    Settings(#[from] LoadError),
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
    #[error("http client error: {0}")]
    HttpClient(String),
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
