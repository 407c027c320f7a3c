//! Exact decimal odds
//!
//! Odds are carried as `rust_decimal::Decimal` so that the value a client
//! submits is the value stored and listed back, with no binary floating-point
//! drift. On the JSON wire they travel as plain numbers (`"odd": 1.13`).

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Decimal odd attached to a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Odd(Decimal);

impl Odd {
    /// Wrap a decimal without validation; see [`Odd::is_valid`]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Create an odd, returning None unless it is strictly positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        let odd = Self(value);
        odd.is_valid().then_some(odd)
    }

    /// Odds must be strictly positive
    pub fn is_valid(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Get the underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Odd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Odd {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Self)
    }
}

impl Serialize for Odd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Odd {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        rust_decimal::serde::float::deserialize(deserializer).map(Self)
    }
}
