//! Decimal price handling: parsing, markup and minor-unit conversion.
//!
//! All money in the relay is `rust_decimal::Decimal`. The affiliate API hands
//! prices over as strings ("12.34") and clients may send strings or JSON
//! numbers; both end up here. A `Decimal` cannot be NaN or infinite, so the
//! only numeric invariant left to enforce is non-negativity.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing or converting prices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// The value is not a decimal number.
    #[error("invalid amount: {0:?}")]
    Invalid(String),

    /// The value is below zero.
    #[error("{0} must not be negative")]
    Negative(&'static str),

    /// The value does not fit in minor units.
    #[error("amount out of range")]
    OutOfRange,
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Convert to the smallest currency unit (cents), rounding half away from zero.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::OutOfRange` if the amount does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        self.amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .ok_or(PriceError::OutOfRange)
    }
}

/// ISO 4217 currency codes supported by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Upper-case ISO code, as the affiliate API expects it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }

    /// Lower-case ISO code, as Stripe expects it.
    #[must_use]
    pub fn as_lowercase(self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(PriceError::Invalid(s.to_string())),
        }
    }
}

/// Percentage markup applied to upstream sale prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markup(Decimal);

impl Markup {
    /// No markup.
    pub const NONE: Self = Self(Decimal::ZERO);

    /// Create a markup from a percentage (`25` means +25%).
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` for percentages below zero.
    pub fn from_percent(percent: Decimal) -> Result<Self, PriceError> {
        ensure_non_negative("markup", percent).map(Self)
    }

    /// The markup percentage.
    #[must_use]
    pub const fn percent(self) -> Decimal {
        self.0
    }

    /// Apply the markup and round to cents.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::OutOfRange` if the marked-up amount overflows.
    pub fn apply(self, amount: Decimal) -> Result<Decimal, PriceError> {
        (self.0 / Decimal::ONE_HUNDRED)
            .checked_add(Decimal::ONE)
            .and_then(|factor| amount.checked_mul(factor))
            .map(|marked_up| {
                marked_up.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            })
            .ok_or(PriceError::OutOfRange)
    }
}

impl Default for Markup {
    fn default() -> Self {
        Self::NONE
    }
}

/// Parse a non-negative decimal amount from text.
///
/// # Errors
///
/// Returns `PriceError::Invalid` for non-numeric input and
/// `PriceError::Negative` for amounts below zero.
pub fn parse_amount(raw: &str) -> Result<Decimal, PriceError> {
    let amount = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|_| PriceError::Invalid(raw.to_string()))?;
    ensure_non_negative("amount", amount)
}

/// Reject negative amounts, naming the offending field.
///
/// # Errors
///
/// Returns `PriceError::Negative` if `amount < 0`.
pub fn ensure_non_negative(field: &'static str, amount: Decimal) -> Result<Decimal, PriceError> {
    if amount < Decimal::ZERO {
        return Err(PriceError::Negative(field));
    }
    Ok(amount)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_minor_units_rounds_half_away_from_zero() {
        let price = Price::new(dec("19.995"), CurrencyCode::USD);
        assert_eq!(price.to_minor_units().unwrap(), 2000);

        let price = Price::new(dec("0.5"), CurrencyCode::USD);
        assert_eq!(price.to_minor_units().unwrap(), 50);
    }

    #[test]
    fn test_minor_units_out_of_range() {
        let price = Price::new(Decimal::MAX, CurrencyCode::USD);
        assert_eq!(price.to_minor_units(), Err(PriceError::OutOfRange));
    }

    #[test]
    fn test_markup_apply() {
        let markup = Markup::from_percent(dec("25")).unwrap();
        assert_eq!(markup.apply(dec("10.00")).unwrap(), dec("12.50"));
        assert_eq!(markup.apply(dec("3.33")).unwrap(), dec("4.16"));
    }

    #[test]
    fn test_markup_none_is_identity() {
        assert_eq!(Markup::NONE.apply(dec("7.99")).unwrap(), dec("7.99"));
    }

    #[test]
    fn test_markup_overflow_is_out_of_range() {
        let markup = Markup::from_percent(dec("25")).unwrap();
        let huge = parse_amount("79228162514264337593543950335").unwrap();
        assert_eq!(markup.apply(huge), Err(PriceError::OutOfRange));
        assert_eq!(Markup::NONE.apply(huge), Ok(huge));
    }

    #[test]
    fn test_markup_rejects_negative() {
        assert_eq!(
            Markup::from_percent(dec("-5")),
            Err(PriceError::Negative("markup"))
        );
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 12.34 ").unwrap(), dec("12.34"));
        assert_eq!(parse_amount("0").unwrap(), Decimal::ZERO);
        assert!(matches!(parse_amount("abc"), Err(PriceError::Invalid(_))));
        assert!(matches!(parse_amount("NaN"), Err(PriceError::Invalid(_))));
        assert_eq!(parse_amount("-1"), Err(PriceError::Negative("amount")));
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert_eq!(CurrencyCode::EUR.as_lowercase(), "eur");
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_decimal_accepts_json_numbers_and_strings() {
        let from_str: Decimal = serde_json::from_str("\"4.20\"").unwrap();
        let from_num: Decimal = serde_json::from_str("4.2").unwrap();
        assert_eq!(from_str, from_num);
    }
}
