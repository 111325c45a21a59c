//! Pricing
//!
//! Money helpers shared by the catalog, the search and the report. The search works on `i64`
//! minor units ("costs"); these helpers convert at the boundaries.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{
    Money, MoneyError,
    iso::{self, Currency},
};
use thiserror::Error;

/// Amount in minor units (cents, pence) used throughout the search.
pub type Cost = i64;

/// Errors that can occur while parsing or combining prices.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// The amount string could not be parsed as a decimal number.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The currency code is not one Quartermaster knows about.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// The amount does not fit into minor units.
    #[error("amount overflows minor units: {0}")]
    Overflow(String),

    /// No amounts were provided, so the currency could not be determined.
    #[error("no amounts provided; cannot determine currency")]
    NoAmounts,

    /// A percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Parse a decimal amount (e.g. `"12.50"`, `"12,50"` or `"1.234,50"`) into minor units.
///
/// When both separators appear, whichever comes last is the decimal mark and the other one
/// groups thousands. Amounts are rounded half away from zero to two decimal places.
///
/// # Errors
///
/// - [`PricingError::InvalidAmount`]: the string is not a decimal number.
/// - [`PricingError::Overflow`]: the amount does not fit into `i64` minor units.
pub fn parse_amount(s: &str) -> Result<Cost, PricingError> {
    let trimmed = s.trim();

    // Listing tables scraped from European shops use a decimal comma.
    let normalised = match (trimmed.rfind(','), trimmed.rfind('.')) {
        (Some(comma), Some(point)) if comma > point => trimmed.replace('.', "").replace(',', "."),
        (Some(_), None) => trimmed.replace(',', "."),
        _ => trimmed.replace(',', ""),
    };

    let amount = normalised
        .parse::<Decimal>()
        .map_err(|_err| PricingError::InvalidAmount(s.to_string()))?;

    amount
        .checked_mul(Decimal::new(100, 0))
        .map(|value| value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|value| value.to_i64())
        .ok_or_else(|| PricingError::Overflow(s.to_string()))
}

/// Parse a price string such as `"50 EUR"` or `"50"` into minor units and a currency.
///
/// When no currency code is present, `default_currency` is used.
///
/// # Errors
///
/// Returns an error if the amount is not a decimal number or the currency code is unknown.
pub fn parse_price(
    s: &str,
    default_currency: &'static Currency,
) -> Result<(Cost, &'static Currency), PricingError> {
    let mut parts = s.split_whitespace();

    let amount = parts
        .next()
        .ok_or_else(|| PricingError::InvalidAmount(s.to_string()))?;

    let currency = match parts.next() {
        Some(code) => currency_from_code(code)?,
        None => default_currency,
    };

    if parts.next().is_some() {
        return Err(PricingError::InvalidAmount(s.to_string()));
    }

    Ok((parse_amount(amount)?, currency))
}

/// Look up a supported ISO currency by its alpha code.
///
/// # Errors
///
/// Returns [`PricingError::UnknownCurrency`] for codes other than EUR, GBP and USD.
pub fn currency_from_code(code: &str) -> Result<&'static Currency, PricingError> {
    match code.trim().to_ascii_uppercase().as_str() {
        "EUR" => Ok(iso::EUR),
        "GBP" => Ok(iso::GBP),
        "USD" => Ok(iso::USD),
        other => Err(PricingError::UnknownCurrency(other.to_string())),
    }
}

/// Sum a list of amounts that share one currency.
///
/// # Errors
///
/// - [`PricingError::NoAmounts`]: no amounts were provided, so the currency is unknown.
/// - [`PricingError::Money`]: wrapped money arithmetic or currency mismatch error.
pub fn total<'a>(amounts: &[Money<'a, Currency>]) -> Result<Money<'a, Currency>, PricingError> {
    let first = amounts.first().ok_or(PricingError::NoAmounts)?;

    let total = amounts
        .iter()
        .try_fold(Money::from_minor(0, first.currency()), |acc, amount| {
            acc.add(*amount)
        })?;

    Ok(total)
}

/// Amount `percent` of `minor`, rounded half away from zero.
///
/// # Errors
///
/// Returns [`PricingError::PercentConversion`] if the calculation overflows.
pub fn percent_of_minor(percent: &Percentage, minor: Cost) -> Result<Cost, PricingError> {
    let minor = Decimal::from_i64(minor).ok_or(PricingError::PercentConversion)?;

    ((*percent) * Decimal::ONE)
        .checked_mul(minor)
        .ok_or(PricingError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PricingError::PercentConversion)
}

/// Whether `percent` is below zero.
pub fn is_negative(percent: &Percentage) -> bool {
    ((*percent) * Decimal::ONE) < Decimal::ZERO
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{EUR, GBP, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parse_amount_accepts_decimal_point_and_comma() -> TestResult {
        assert_eq!(parse_amount("12.50")?, 1250);
        assert_eq!(parse_amount("12,50")?, 1250);
        assert_eq!(parse_amount(" 7 ")?, 700);

        Ok(())
    }

    #[test]
    fn parse_amount_treats_comma_as_thousands_separator_next_to_point() -> TestResult {
        assert_eq!(parse_amount("1,299.99")?, 129_999);
        assert_eq!(parse_amount("1,234,567.5")?, 123_456_750);

        Ok(())
    }

    #[test]
    fn parse_amount_treats_point_as_thousands_separator_before_a_decimal_comma() -> TestResult {
        assert_eq!(parse_amount("1.234,50")?, 123_450);
        assert_eq!(parse_amount("1.234.567,5")?, 123_456_750);
        assert_eq!(parse_amount("1,234.50")?, 123_450);

        Ok(())
    }

    #[test]
    fn parse_amount_rounds_half_away_from_zero() -> TestResult {
        assert_eq!(parse_amount("0.125")?, 13);
        assert_eq!(parse_amount("-0.125")?, -13);

        Ok(())
    }

    #[test]
    fn parse_amount_rejects_garbage() {
        assert!(matches!(
            parse_amount("twelve"),
            Err(PricingError::InvalidAmount(_))
        ));
    }

    #[test]
    fn parse_price_uses_default_currency_without_code() -> TestResult {
        let (minor, currency) = parse_price("50", EUR)?;

        assert_eq!(minor, 5000);
        assert_eq!(currency, EUR);

        Ok(())
    }

    #[test]
    fn parse_price_reads_currency_code() -> TestResult {
        let (gbp_minor, gbp) = parse_price("2.99 GBP", EUR)?;
        let (usd_minor, usd) = parse_price("1 usd", EUR)?;

        assert_eq!((gbp_minor, gbp), (299, GBP));
        assert_eq!((usd_minor, usd), (100, USD));

        Ok(())
    }

    #[test]
    fn parse_price_rejects_unknown_currency() {
        let result = parse_price("2.99 ABC", EUR);

        assert!(matches!(result, Err(PricingError::UnknownCurrency(code)) if code == "ABC"));
    }

    #[test]
    fn total_sums_amounts() -> TestResult {
        let amounts = [Money::from_minor(100, EUR), Money::from_minor(250, EUR)];

        assert_eq!(total(&amounts)?, Money::from_minor(350, EUR));

        Ok(())
    }

    #[test]
    fn total_of_nothing_is_an_error() {
        let amounts: [Money<'static, Currency>; 0] = [];

        assert!(matches!(total(&amounts), Err(PricingError::NoAmounts)));
    }

    #[test]
    fn percent_of_minor_rounds() -> TestResult {
        assert_eq!(percent_of_minor(&Percentage::from(0.05), 10_010)?, 501);
        assert_eq!(percent_of_minor(&Percentage::from(0.0), 10_010)?, 0);

        Ok(())
    }

    #[test]
    fn negative_percentages_are_detected() {
        assert!(is_negative(&Percentage::from(-0.01)));
        assert!(!is_negative(&Percentage::from(0.0)));
        assert!(!is_negative(&Percentage::from(0.05)));
    }
}
