//! Authenticated client for the relay management API.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug_span};

use super::response::{decode, send};
use crate::config::with_trailing_slash;
use crate::fetch::FetchError;
use crate::infra::error::InfraError;
use crate::session::TokenProvider;

/// Relay API client. Every request carries the bearer token read from the
/// [`TokenProvider`] at send time; without one the call fails with
/// [`FetchError::MissingToken`] before any I/O.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(base: Url, tokens: Arc<dyn TokenProvider>) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(|err| InfraError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            base: with_trailing_slash(base),
            tokens,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("relay-admin/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|err| FetchError::InvalidRequest(format!("invalid path `{path}`: {err}")))
    }

    pub async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        let body = self.dispatch(Method::GET, url, None::<&()>).await?;
        decode(&body)
    }

    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, FetchError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let body = self.dispatch(method, url, Some(body)).await?;
        decode(&body)
    }

    /// Send a request whose response body is ignored.
    pub async fn send_unit<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), FetchError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        self.dispatch(method, url, body).await.map(|_| ())
    }

    pub async fn delete(&self, path: &str) -> Result<(), FetchError> {
        self.send_unit(Method::DELETE, path, None::<&()>).await
    }

    async fn dispatch<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Vec<u8>, FetchError>
    where
        B: Serialize + ?Sized,
    {
        let token = self.tokens.read_token().ok_or(FetchError::MissingToken)?;
        let span = debug_span!("relay_api", method = %method, path = url.path());

        let mut request: RequestBuilder = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {token}"));
        if let Some(body) = body {
            request = request.json(body);
        }

        send(request).instrument(span).await
    }
}
