//! Wallet address: `0x` + 40 hex chars. Canonical form is lower-case.

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0[xX][0-9a-fA-F]{40}$").expect("static regex"));

pub const ADDRESS_BYTES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if !ADDRESS_RE.is_match(trimmed) {
            return Err(ValidationError::InvalidAddress(truncate(trimmed)));
        }
        Ok(Self(format!("0x{}", trimmed[2..].to_ascii_lowercase())))
    }

    pub fn from_bytes(bytes: &[u8; ADDRESS_BYTES]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    /// Raw 20-byte form.
    pub fn to_bytes(&self) -> [u8; ADDRESS_BYTES] {
        let mut out = [0u8; ADDRESS_BYTES];
        // Canonical form is validated hex, decoding cannot fail.
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&decoded);
        }
        out
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for WalletAddress {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(&self.0) }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// Keep error messages bounded when clients send garbage.
fn truncate(raw: &str) -> String {
    raw.chars().take(64).collect()
}
