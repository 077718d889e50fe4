//! Money helpers for peso-denominated amounts.
//!
//! Order totals are stored as [`Decimal`] values in the currency's standard
//! unit (pesos). The payment processor wants integer minor units (centavos),
//! so conversions both ways live here.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Errors converting an amount to minor currency units.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is negative.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount does not fit in an i64 once scaled to minor units.
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// Convert a peso amount to integer centavos.
///
/// Midpoints round away from zero, matching what a cash register would
/// charge rather than banker's rounding.
///
/// # Errors
///
/// Returns [`MoneyError::Negative`] for negative amounts and
/// [`MoneyError::OutOfRange`] if the scaled value overflows an `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }

    let scaled = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(MoneyError::OutOfRange(amount))?;

    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(MoneyError::OutOfRange(amount))
}

/// Convert integer centavos back to a peso amount.
#[must_use]
pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
