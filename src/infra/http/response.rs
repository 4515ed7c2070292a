//! Mapping of HTTP outcomes onto [`FetchError`].

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::fetch::FetchError;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Send `request` and return the body of a successful response.
pub(super) async fn send(request: RequestBuilder) -> Result<Vec<u8>, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|err| FetchError::Network(err.to_string()))?;
    let status = response.status();
    let retry_after = retry_after_seconds(response.headers());
    let body = response
        .bytes()
        .await
        .map_err(|err| FetchError::Network(err.to_string()))?;

    debug!(status = status.as_u16(), bytes = body.len(), "response received");

    if status.is_success() {
        Ok(body.to_vec())
    } else {
        Err(status_error(status, retry_after, &body))
    }
}

pub(super) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|err| FetchError::malformed(err.to_string()))
}

pub(super) fn status_error(status: StatusCode, retry_after: Option<u64>, body: &[u8]) -> FetchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited { retry_after },
        _ if status.is_server_error() => FetchError::Server {
            status: status.as_u16(),
            body: excerpt(body),
        },
        _ => FetchError::Rejected {
            status: status.as_u16(),
            body: excerpt(body),
        },
    }
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn excerpt(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn statuses_map_to_error_kinds() {
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, None, b""),
            FetchError::Unauthorized { status: 401 }
        );
        assert_eq!(
            status_error(StatusCode::FORBIDDEN, None, b""),
            FetchError::Unauthorized { status: 403 }
        );
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(12), b"slow down"),
            FetchError::RateLimited {
                retry_after: Some(12)
            }
        );
        assert_eq!(
            status_error(StatusCode::BAD_GATEWAY, None, b"upstream"),
            FetchError::Server {
                status: 502,
                body: "upstream".into()
            }
        );
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, None, b"missing"),
            FetchError::Rejected {
                status: 404,
                body: "missing".into()
            }
        );
    }

    #[test]
    fn retry_after_accepts_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_seconds(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(retry_after_seconds(&headers), Some(30));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_seconds(&headers), None);
    }

    #[test]
    fn error_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS * 2);
        match status_error(StatusCode::BAD_REQUEST, None, body.as_bytes()) {
            FetchError::Rejected { body, .. } => assert_eq!(body.len(), MAX_ERROR_BODY_CHARS),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_failures_are_malformed() {
        let err = decode::<Vec<u32>>(b"{\"not\": \"a list\"}").expect_err("shape mismatch");
        assert!(matches!(err, FetchError::Malformed(_)));
    }
}
