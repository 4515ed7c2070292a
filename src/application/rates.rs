//! Bitcoin rate series from the relay or from CoinGecko.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use relay_admin_api_types::BitcoinRate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::cache::{CacheStats, VolatileCache};
use crate::domain::{DomainError, RatePoint};
use crate::fetch::{FetchError, Fetcher, SingleFlight};
use crate::infra::http::{ApiClient, CoinGeckoClient};

pub const RELAY_RATES_PATH: &str = "api/bitcoin-rates/last-30-days";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSourceKind {
    Relay,
    CoinGecko,
}

impl RateSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relay => "relay",
            Self::CoinGecko => "coingecko",
        }
    }
}

impl fmt::Display for RateSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateSourceKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relay" => Ok(Self::Relay),
            "coingecko" => Ok(Self::CoinGecko),
            other => Err(DomainError::validation(
                "source",
                format!("unknown rate source `{other}`"),
            )),
        }
    }
}

/// Upstream that produces a rate series.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn kind(&self) -> RateSourceKind;

    async fn fetch(&self) -> Result<Vec<RatePoint>, FetchError>;
}

pub struct RelayRateSource {
    api: ApiClient,
}

impl RelayRateSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RateSource for RelayRateSource {
    fn kind(&self) -> RateSourceKind {
        RateSourceKind::Relay
    }

    async fn fetch(&self) -> Result<Vec<RatePoint>, FetchError> {
        let rows: Vec<BitcoinRate> = self.api.get_json(RELAY_RATES_PATH, &[]).await?;
        map_points(RateSourceKind::Relay, rows.iter().map(RatePoint::from_relay))
    }
}

pub struct CoinGeckoRateSource {
    client: CoinGeckoClient,
}

impl CoinGeckoRateSource {
    pub fn new(client: CoinGeckoClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RateSource for CoinGeckoRateSource {
    fn kind(&self) -> RateSourceKind {
        RateSourceKind::CoinGecko
    }

    async fn fetch(&self) -> Result<Vec<RatePoint>, FetchError> {
        // CoinGecko credentials are not ours; a 401 there must not end the relay session.
        let pairs = self.client.market_chart().await.map_err(|err| match err {
            FetchError::Unauthorized { status } => FetchError::Rejected {
                status,
                body: String::new(),
            },
            other => other,
        })?;
        map_points(
            RateSourceKind::CoinGecko,
            pairs.into_iter().map(RatePoint::from_market_pair),
        )
    }
}

/// Keep the valid rows. A non-empty payload with no usable row is malformed.
fn map_points<I>(kind: RateSourceKind, rows: I) -> Result<Vec<RatePoint>, FetchError>
where
    I: IntoIterator<Item = Result<RatePoint, DomainError>>,
{
    let mut points = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        match row {
            Ok(point) => points.push(point),
            Err(err) => {
                skipped += 1;
                warn!(source = %kind, error = %err, "skipping invalid rate row");
            }
        }
    }
    if points.is_empty() && skipped > 0 {
        return Err(FetchError::malformed(format!(
            "{kind} returned {skipped} rows and none were valid"
        )));
    }
    Ok(points)
}

/// Cached, coalesced access to the rate series of every configured source.
#[derive(Clone)]
pub struct RateService {
    sources: Arc<HashMap<RateSourceKind, Arc<dyn RateSource>>>,
    cache: Arc<VolatileCache<RateSourceKind, Vec<RatePoint>>>,
    flights: Arc<SingleFlight<RateSourceKind, Vec<RatePoint>>>,
    fetcher: Fetcher,
}

impl RateService {
    pub fn new(
        sources: Vec<Arc<dyn RateSource>>,
        cache: VolatileCache<RateSourceKind, Vec<RatePoint>>,
        fetcher: Fetcher,
    ) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.kind(), source))
            .collect();
        Self {
            sources: Arc::new(sources),
            cache: Arc::new(cache),
            flights: Arc::new(SingleFlight::new("rates")),
            fetcher,
        }
    }

    /// Series for `kind`, oldest first. Served from cache while fresh.
    #[instrument(skip(self), fields(source = %kind))]
    pub async fn rates(&self, kind: RateSourceKind) -> Result<Vec<RatePoint>, FetchError> {
        if let Some(points) = self.cache.get(&kind) {
            return Ok(points);
        }
        let source = self.sources.get(&kind).cloned().ok_or_else(|| {
            FetchError::InvalidRequest(format!("no rate source configured for {kind}"))
        })?;

        let cache = Arc::clone(&self.cache);
        self.fetcher
            .fetch(&self.flights, kind, move || {
                let source = Arc::clone(&source);
                let cache = Arc::clone(&cache);
                async move {
                    let mut points = source.fetch().await?;
                    points.sort_by_key(|point| point.timestamp);
                    debug!(points = points.len(), "rate series refreshed");
                    cache.set(kind, points.clone());
                    Ok(points)
                }
            })
            .await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
