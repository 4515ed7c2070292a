use serde::{Deserialize, Serialize};

/// One row of `GET /api/bitcoin-rates/last-30-days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitcoinRate {
    #[serde(rename = "Rate")]
    pub rate: RateValue,
    #[serde(rename = "TimestampHornets")]
    pub timestamp: String,
}

/// The relay reports rates either as JSON numbers or as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateValue {
    Number(f64),
    Text(String),
}

impl RateValue {
    /// Numeric value, or `None` when the text form does not parse.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Subset of the CoinGecko `market_chart` response.
///
/// `prices` is optional so that a payload without it decodes and can be
/// reported as malformed by the caller instead of as a transport failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Option<Vec<(f64, f64)>>,
}
