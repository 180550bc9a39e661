//! Money arithmetic on `rust_decimal` amounts.
//!
//! Prices are stored as `NUMERIC(10,2)` and handled as [`Decimal`] in the
//! store's single currency. Payment providers want integer minor units.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Errors from money conversions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is negative.
    #[error("amount cannot be negative")]
    Negative,
    /// The amount does not fit in the target integer type.
    #[error("amount is out of range")]
    OutOfRange,
}

/// Total for a line of `quantity` units at `unit_price`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Convert an amount to minor units (cents), rounding half away from zero.
///
/// ```
/// use cartwheel_core::to_minor_units;
/// use rust_decimal::Decimal;
///
/// assert_eq!(to_minor_units(Decimal::new(1999, 2)), Ok(1999));
/// ```
///
/// # Errors
///
/// Returns `MoneyError::Negative` for negative amounts and
/// `MoneyError::OutOfRange` when the cents value overflows `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative);
    }
    let cents = (amount * Decimal::ONE_HUNDRED).round_dp_with_strategy(
        0,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    );
    cents.to_i64().ok_or(MoneyError::OutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(Decimal::new(1000, 2), 3), Decimal::new(3000, 2));
        assert_eq!(line_total(Decimal::new(1999, 2), 0), Decimal::ZERO);
    }

    #[test]
    fn test_to_minor_units_rounds() {
        assert_eq!(to_minor_units(Decimal::new(10005, 3)), Ok(1001));
        assert_eq!(to_minor_units(Decimal::ZERO), Ok(0));
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        assert_eq!(
            to_minor_units(Decimal::new(-1, 2)),
            Err(MoneyError::Negative)
        );
    }
}
