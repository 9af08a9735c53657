//! Amounts of money kept as integer cents.
//!
//! Every arithmetic helper is checked. Callers turn `None` into an
//! [`EngineError::InvalidAmount`] instead of wrapping around.
use std::{fmt, str::FromStr};

use crate::EngineError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: Self = Self(0);

    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Price of `quantity` units at `self` each.
    pub fn checked_times(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }
}

/// Renders as `12.50`, `-0.05`.
impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Accepts `12`, `12.5`, `12.50`, `-3,20` with an optional sign and at most
/// two decimals.
impl FromStr for MoneyCents {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || EngineError::InvalidAmount(format!("'{s}' is not an amount"));

        let raw = s.trim();
        let (negative, digits) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };
        let (units, fraction) = digits.split_once(['.', ',']).unwrap_or((digits, ""));

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if units.is_empty() || !all_digits(units) || !all_digits(fraction) {
            return Err(malformed());
        }
        if fraction.len() > 2 {
            return Err(EngineError::InvalidAmount(format!(
                "'{s}' has more than two decimals"
            )));
        }

        let fraction_cents: i64 = format!("{fraction:0<2}").parse().map_err(|_| malformed())?;
        let cents = units
            .parse::<i64>()
            .ok()
            .and_then(|u| u.checked_mul(100))
            .and_then(|c| c.checked_add(fraction_cents))
            .ok_or_else(|| EngineError::InvalidAmount(format!("'{s}' is out of range")))?;

        Ok(Self(if negative { -cents } else { cents }))
    }
}
