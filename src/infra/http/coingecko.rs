//! Unauthenticated client for the CoinGecko market-chart endpoint.

use relay_admin_api_types::MarketChart;
use reqwest::{Client, Url};
use tracing::{Instrument, debug_span};

use super::response::{decode, send};
use crate::config::{CoinGeckoSettings, with_trailing_slash};
use crate::fetch::FetchError;
use crate::infra::error::InfraError;

const MARKET_CHART_PATH: &str = "api/v3/coins/bitcoin/market_chart";

#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base: Url,
    vs_currency: String,
    days: u32,
}

impl CoinGeckoClient {
    pub fn new(settings: &CoinGeckoSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(super::ApiClient::user_agent())
            .build()
            .map_err(|err| InfraError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            base: with_trailing_slash(settings.base_url.clone()),
            vs_currency: settings.vs_currency.clone(),
            days: settings.days,
        })
    }

    /// Price history as `[unix_millis, price]` pairs.
    ///
    /// A payload without a `prices` array is [`FetchError::Malformed`].
    pub async fn market_chart(&self) -> Result<Vec<(f64, f64)>, FetchError> {
        let mut url = self
            .base
            .join(MARKET_CHART_PATH)
            .map_err(|err| FetchError::InvalidRequest(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("vs_currency", &self.vs_currency)
            .append_pair("days", &self.days.to_string());

        let span = debug_span!("coingecko", days = self.days);
        let body = send(self.client.get(url)).instrument(span).await?;
        let chart: MarketChart = decode(&body)?;
        chart
            .prices
            .ok_or_else(|| FetchError::malformed("market chart response has no `prices` array"))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    fn client(server: &MockServer) -> CoinGeckoClient {
        CoinGeckoClient::new(&CoinGeckoSettings {
            base_url: Url::parse(&server.base_url()).expect("url"),
            vs_currency: "usd".into(),
            days: 30,
        })
        .expect("client")
    }

    #[tokio::test]
    async fn fetches_prices() -> Result<(), FetchError> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/api/v3/coins/bitcoin/market_chart")
                .query_param("vs_currency", "usd")
                .query_param("days", "30");
            then.status(200)
                .body(r#"{"prices": [[1714564800000, 64000.0], [1714651200000, 65000.5]]}"#);
        });

        let prices = client(&server).market_chart().await?;
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].1, 65000.5);
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn missing_prices_is_malformed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/api/v3/coins/bitcoin/market_chart");
            then.status(200).body(r#"{"market_caps": []}"#);
        });

        let err = client(&server).market_chart().await.expect_err("no prices");
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn throttling_is_reported_distinctly() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/api/v3/coins/bitcoin/market_chart");
            then.status(429).header("retry-after", "60");
        });

        let err = client(&server).market_chart().await.expect_err("limited");
        assert_eq!(
            err,
            FetchError::RateLimited {
                retry_after: Some(60)
            }
        );
    }
}
