//! Money helpers for the retail ledger
//!
//! Amounts are whole currency units (no minor units), so every monetary field
//! is an `i64`. The partner share is the only place fractional arithmetic
//! appears; it is computed exactly with `Decimal` and rounded half-up back to a
//! whole amount.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Whole-unit currency amount
pub type Amount = i64;

/// Round a decimal to the nearest whole amount, halves toward +infinity
///
/// `2.5 -> 3`, `-2.5 -> -2`.
pub fn round_half_up(value: Decimal) -> Amount {
    let rounded = (value + Decimal::new(5, 1)).floor();
    rounded.to_i64().unwrap_or(if rounded.is_sign_negative() {
        Amount::MIN
    } else {
        Amount::MAX
    })
}

/// Fraction of profit owed to the revenue-sharing partner
///
/// Always within `[0, 1]`. Parsed from strings such as `"0.20"` or `"0.2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShareRate(Decimal);

impl ShareRate {
    /// The default 20% partner share
    pub const DEFAULT: ShareRate = ShareRate(Decimal::from_parts(20, 0, 0, false, 2));

    /// Create a rate, rejecting values outside `[0, 1]`
    pub fn new(rate: Decimal) -> Result<Self, String> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(format!("share rate {} must be between 0 and 1", rate));
        }
        Ok(ShareRate(rate))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Partner share of a single sale: never negative, a loss pays nothing
    pub fn share_of_profit(&self, profit: Amount) -> Amount {
        self.apply(profit.max(0))
    }

    /// Rounded `gross * rate`, sign preserved
    ///
    /// Used for the prospective deduction on unsold stock, where the gross
    /// margin is taken as-is.
    pub fn apply(&self, gross: Amount) -> Amount {
        round_half_up(Decimal::from(gross) * self.0)
    }
}

impl Default for ShareRate {
    fn default() -> Self {
        ShareRate::DEFAULT
    }
}

impl fmt::Display for ShareRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ShareRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rate = Decimal::from_str(s.trim())
            .map_err(|e| format!("invalid share rate '{}': {}", s, e))?;
        ShareRate::new(rate)
    }
}

impl Serialize for ShareRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ShareRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // TOML and JSON both write bare floats; go through the shortest
        // decimal representation so 0.2 stays exactly 0.2.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawRate {
            Text(String),
            Number(f64),
        }

        let text = match RawRate::deserialize(deserializer)? {
            RawRate::Text(text) => text,
            RawRate::Number(number) => number.to_string(),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}
