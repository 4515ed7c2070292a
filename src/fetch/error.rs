use thiserror::Error;

/// Failure of a data-access operation.
///
/// The type is `Clone` because one failed request is observed by every
/// caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error (status {status}): {body}")]
    Server { status: u16, body: String },
    #[error("authentication failed (status {status})")]
    Unauthorized { status: u16 },
    #[error("no authentication token available")]
    MissingToken,
    #[error("rate limited by upstream{}", retry_after_suffix(.retry_after))]
    RateLimited { retry_after: Option<u64> },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("request rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request cancelled")]
    Cancelled,
}

/// Coarse handling category of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Eligible for bounded retry.
    Transient,
    /// Authentication failure: never retried, invalidates the session.
    Auth,
    /// Upstream throttling: surfaced, left to the caller to back off.
    RateLimited,
    /// Response did not have the expected shape.
    Malformed,
    /// Any other failure that retrying cannot fix.
    Terminal,
    Cancelled,
}

impl FetchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Network(_) | Self::Server { .. } => ErrorClass::Transient,
            Self::Unauthorized { .. } | Self::MissingToken => ErrorClass::Auth,
            Self::RateLimited { .. } => ErrorClass::RateLimited,
            Self::Malformed(_) => ErrorClass::Malformed,
            Self::Rejected { .. } | Self::InvalidRequest(_) => ErrorClass::Terminal,
            Self::Cancelled => ErrorClass::Cancelled,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    pub fn is_auth(&self) -> bool {
        self.class() == ErrorClass::Auth
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed(detail.into())
    }
}

fn retry_after_suffix(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(seconds) => format!(" (retry after {seconds}s)"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_structural() {
        assert!(FetchError::Network("connection reset".into()).is_retryable());
        assert!(
            FetchError::Server {
                status: 502,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(FetchError::Unauthorized { status: 401 }.is_auth());
        assert!(FetchError::MissingToken.is_auth());
        assert!(!FetchError::RateLimited { retry_after: None }.is_retryable());
        assert!(!FetchError::malformed("network").is_retryable());
        assert_eq!(
            FetchError::Rejected {
                status: 404,
                body: String::new()
            }
            .class(),
            ErrorClass::Terminal
        );
    }

    #[test]
    fn rate_limited_message_mentions_delay() {
        let err = FetchError::RateLimited {
            retry_after: Some(30),
        };
        assert_eq!(err.to_string(), "rate limited by upstream (retry after 30s)");
        assert_eq!(
            FetchError::RateLimited { retry_after: None }.to_string(),
            "rate limited by upstream"
        );
    }
}
