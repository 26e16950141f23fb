//! Numeric helpers shared by the engine and by anything displaying its output.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Replaces NaN and infinities with zero so they never reach a total.
///
/// # Examples
///
/// ```
/// use budget_core::calculations::common::finite_or_zero;
///
/// assert_eq!(finite_or_zero(12.5), 12.5);
/// assert_eq!(finite_or_zero(f64::NAN), 0.0);
/// assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
/// ```
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Coerces an optional field, treating absence like zero.
pub fn field_or_zero(value: Option<f64>) -> f64 {
    value.map_or(0.0, finite_or_zero)
}

/// Rounds a total to whole cents using half-up rounding.
///
/// Only used for display; the engine itself never rounds. Values that
/// cannot be represented as a [`Decimal`] come back as zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use budget_core::calculations::common::round_currency;
///
/// assert_eq!(round_currency(43750.0), dec!(43750.00));
/// assert_eq!(round_currency(1234.567), dec!(1234.57));
/// assert_eq!(round_currency(f64::NAN), dec!(0));
/// ```
pub fn round_currency(value: f64) -> Decimal {
    Decimal::from_f64(finite_or_zero(value))
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
