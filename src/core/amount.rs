//! Fixed-point payout amount. Six fractional digits, stored as micro-units.
//!
//! Amounts are parsed from decimal text only. Floats never enter the path.

use crate::error::ValidationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const SCALE: u32 = 6;
const UNIT: u128 = 10u128.pow(SCALE);
/// Upper bound on the integer part, keeps gateways out of overflow territory.
const MAX_INTEGER_DIGITS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(u128);

impl Amount {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let s = raw.trim();
        let invalid = |why: &str| ValidationError::InvalidAmount(format!("{why}: {}", s.chars().take(32).collect::<String>()));

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("empty"));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("not a plain decimal"));
        }
        if s.ends_with('.') {
            return Err(invalid("not a plain decimal"));
        }
        if frac_part.len() > SCALE as usize {
            return Err(invalid("too many fractional digits"));
        }
        if int_part.trim_start_matches('0').len() > MAX_INTEGER_DIGITS {
            return Err(invalid("too large"));
        }

        let int: u128 = if int_part.is_empty() { 0 } else { int_part.parse().map_err(|_| invalid("too large"))? };
        let mut frac: u128 = if frac_part.is_empty() { 0 } else { frac_part.parse().map_err(|_| invalid("not a plain decimal"))? };
        frac *= 10u128.pow(SCALE - frac_part.len() as u32);

        let micros = int * UNIT + frac;
        if micros == 0 {
            return Err(invalid("must be positive"));
        }
        Ok(Self(micros))
    }

    pub fn from_micros(micros: u128) -> Option<Self> {
        (micros > 0).then_some(Self(micros))
    }

    pub fn micros(&self) -> u128 { self.0 }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            return write!(f, "{int}");
        }
        let digits = format!("{:0width$}", frac, width = SCALE as usize);
        write!(f, "{int}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(&self.to_string()) }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        // JSON numbers arrive as their literal text (serde_json `arbitrary_precision`).
        let value = serde_json::Value::deserialize(d)?;
        let raw = match &value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return Err(serde::de::Error::custom("amount must be a string or number")),
        };
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
