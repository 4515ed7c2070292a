//! Nostr public keys in their 64-character hex form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

const HEX32_BYTES: usize = 32;

/// Decode 64 hex characters (surrounding whitespace ignored) and re-encode
/// them in lower case.
pub(super) fn normalize_hex32(field: &'static str, input: &str) -> Result<String, DomainError> {
    let mut bytes = [0u8; HEX32_BYTES];
    hex::decode_to_slice(input.trim(), &mut bytes).map_err(|err| {
        DomainError::validation(field, format!("expected 64 hex characters ({err})"))
    })?;
    Ok(hex::encode(bytes))
}

/// Lower-case hex encoding of a 32-byte public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pubkey(String);

impl Pubkey {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        normalize_hex32("pubkey", input).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for Pubkey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Pubkey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pubkey> for String {
    fn from(value: Pubkey) -> Self {
        value.0
    }
}

impl AsRef<str> for Pubkey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
