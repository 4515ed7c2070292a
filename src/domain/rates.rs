//! Bitcoin price points.

use relay_admin_api_types::BitcoinRate;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub rate: f64,
    #[serde(with = "rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl RatePoint {
    /// Map a relay row. The rate may be a number or a decimal string; the
    /// timestamp may be RFC 3339 or unix seconds.
    pub fn from_relay(row: &BitcoinRate) -> Result<Self, DomainError> {
        let rate = row
            .rate
            .as_f64()
            .filter(|rate| rate.is_finite())
            .ok_or_else(|| DomainError::validation("rate", "not a number"))?;
        let timestamp = parse_timestamp(&row.timestamp)?;
        Ok(Self { rate, timestamp })
    }

    /// Map a CoinGecko `[unix_millis, price]` pair.
    pub fn from_market_pair((millis, price): (f64, f64)) -> Result<Self, DomainError> {
        if !price.is_finite() || !millis.is_finite() {
            return Err(DomainError::validation("prices", "non-finite value"));
        }
        let timestamp = OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
            .map_err(|err| DomainError::validation("prices", err.to_string()))?;
        Ok(Self {
            rate: price,
            timestamp,
        })
    }
}

mod rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339).map_err(de::Error::custom)
    }
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, DomainError> {
    let raw = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(parsed);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .ok_or_else(|| DomainError::validation("timestamp", format!("unrecognised `{raw}`")))
}

#[cfg(test)]
mod tests {
    use relay_admin_api_types::RateValue;
    use time::macros::datetime;

    use super::*;

    fn row(rate: RateValue, timestamp: &str) -> BitcoinRate {
        BitcoinRate {
            rate,
            timestamp: timestamp.to_string(),
        }
    }

    #[test]
    fn relay_rows_accept_both_timestamp_forms() {
        let rfc = RatePoint::from_relay(&row(RateValue::Text("65000.5".into()), "2024-05-01T12:00:00Z"))
            .expect("rfc3339");
        assert_eq!(rfc.rate, 65000.5);
        assert_eq!(rfc.timestamp, datetime!(2024-05-01 12:00 UTC));

        let unix = RatePoint::from_relay(&row(RateValue::Number(1.0), "1714564800")).expect("unix");
        assert_eq!(unix.timestamp, datetime!(2024-05-01 12:00 UTC));
    }

    #[test]
    fn bad_rows_are_rejected() {
        assert!(RatePoint::from_relay(&row(RateValue::Text("n/a".into()), "1714564800")).is_err());
        assert!(RatePoint::from_relay(&row(RateValue::Number(1.0), "yesterday")).is_err());
    }

    #[test]
    fn market_pairs_use_millis() {
        let point = RatePoint::from_market_pair((1_714_564_800_000.0, 64000.0)).expect("pair");
        assert_eq!(point.timestamp, datetime!(2024-05-01 12:00 UTC));
        assert!(RatePoint::from_market_pair((f64::NAN, 1.0)).is_err());
    }
}
