//! Money & Quantities
//!
//! All arithmetic in the engine happens on integer minor units. Decimal values only appear at the
//! edges: when reading amounts from a snapshot and when rounding amounts for display or payloads.

use std::{fmt, num::NonZeroU32};

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Findable, Money, iso::Currency};
use thiserror::Error;

/// A monetary amount in a cart's currency.
pub type Price = Money<'static, Currency>;

/// Number of minor units in a major unit for every supported currency.
const MINOR_SCALE: u32 = 2;

/// Errors raised while constructing monetary values, quantities or percentages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    /// A price was negative.
    #[error("price must not be negative, got {0} minor units")]
    NegativePrice(i64),

    /// A price that must be strictly positive was zero.
    #[error("price must be greater than zero")]
    ZeroPrice,

    /// A quantity was negative.
    #[error("quantity must not be negative, got {0}")]
    NegativeQuantity(i64),

    /// A quantity was zero where at least one unit is required.
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    /// A quantity did not fit the supported range.
    #[error("quantity {0} is out of range")]
    QuantityOutOfRange(i64),

    /// A discount percentage was outside `[0, 100]`.
    #[error("discount percent must be between 0 and 100, got {0}")]
    DiscountOutOfRange(Decimal),

    /// A decimal amount had more precision than the currency supports, or overflowed.
    #[error("amount {0} cannot be represented in minor units")]
    Unrepresentable(Decimal),

    /// Minor unit arithmetic overflowed.
    #[error("money arithmetic overflowed")]
    Overflow,
}

/// Looks up an ISO currency by alpha code, accepting only currencies with two minor digits.
pub fn find_currency(code: &str) -> Option<&'static Currency> {
    Currency::find(code).filter(|currency| currency.exponent == MINOR_SCALE)
}

/// Builds a non-negative price from minor units.
///
/// # Errors
///
/// Returns [`AmountError::NegativePrice`] when `minor` is below zero.
pub fn price(minor: i64, currency: &'static Currency) -> Result<Price, AmountError> {
    if minor < 0 {
        return Err(AmountError::NegativePrice(minor));
    }

    Ok(Money::from_minor(minor, currency))
}

/// Passes `amount` through if it is not negative.
///
/// # Errors
///
/// Returns [`AmountError::NegativePrice`] for amounts below zero.
pub fn non_negative(amount: Price) -> Result<Price, AmountError> {
    price(amount.to_minor_units(), amount.currency())
}

/// Builds a strictly positive price from minor units.
///
/// # Errors
///
/// Returns [`AmountError::NegativePrice`] or [`AmountError::ZeroPrice`].
pub fn positive_price(minor: i64, currency: &'static Currency) -> Result<Price, AmountError> {
    if minor == 0 {
        return Err(AmountError::ZeroPrice);
    }

    price(minor, currency)
}

/// Converts a major-unit decimal (e.g. `3.99`) into a non-negative price.
///
/// # Errors
///
/// Returns [`AmountError::Unrepresentable`] if the amount has fractional minor units or
/// overflows, and [`AmountError::NegativePrice`] if it is negative.
pub fn price_from_decimal(
    amount: Decimal,
    currency: &'static Currency,
) -> Result<Price, AmountError> {
    price(to_minor(amount)?, currency)
}

/// Converts a major-unit decimal into minor units without rounding.
///
/// # Errors
///
/// Returns [`AmountError::Unrepresentable`] when the value has sub-minor precision or overflows.
pub fn to_minor(amount: Decimal) -> Result<i64, AmountError> {
    let scaled = amount
        .checked_mul(Decimal::from(10_i64.pow(MINOR_SCALE)))
        .ok_or(AmountError::Unrepresentable(amount))?;

    if scaled.fract() != Decimal::ZERO {
        return Err(AmountError::Unrepresentable(amount));
    }

    scaled.to_i64().ok_or(AmountError::Unrepresentable(amount))
}

/// Rounds a price to two decimal places in major units.
///
/// This is the only conversion out of minor units and is meant for display and API payloads.
pub fn round2(price: &Price) -> Decimal {
    Decimal::new(price.to_minor_units(), MINOR_SCALE)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Calculate a percentage of a minor unit amount, rounded half away from zero.
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the calculation cannot be represented in an `i64`.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, AmountError> {
    let minor = Decimal::from_i64(minor).ok_or(AmountError::Overflow)?;

    ((*percent) * Decimal::ONE) // `Percentage` keeps its decimal private
        .checked_mul(minor)
        .ok_or(AmountError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(AmountError::Overflow)
}

/// A strictly positive unit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A single unit.
    pub const ONE: Quantity = Quantity(NonZeroU32::MIN);

    /// Validates a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`] for negative, zero or oversized quantities.
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value < 0 {
            return Err(AmountError::NegativeQuantity(value));
        }

        let value = u32::try_from(value).map_err(|_err| AmountError::QuantityOutOfRange(value))?;

        NonZeroU32::new(value)
            .map(Quantity)
            .ok_or(AmountError::ZeroQuantity)
    }

    /// The quantity as a plain integer.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A discount expressed in percentage points, from 0 to 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    /// No discount.
    pub const ZERO: DiscountPercent = DiscountPercent(Decimal::ZERO);

    /// Validates a percentage in points (e.g. `10` for 10%).
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::DiscountOutOfRange`] outside `[0, 100]`.
    pub fn new(points: Decimal) -> Result<Self, AmountError> {
        if points < Decimal::ZERO || points > Decimal::ONE_HUNDRED {
            return Err(AmountError::DiscountOutOfRange(points));
        }

        Ok(Self(points))
    }

    /// Percentage points.
    pub fn points(self) -> Decimal {
        self.0
    }

    /// Whether this discount takes anything off.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// The discount as a fractional percentage.
    pub fn as_percentage(self) -> Percentage {
        Percentage::from(self.0 / Decimal::ONE_HUNDRED)
    }
}

/// Multiplies a unit amount by a count, guarding against overflow.
pub(crate) fn times(minor: i64, count: u32) -> Result<i64, AmountError> {
    minor
        .checked_mul(i64::from(count))
        .ok_or(AmountError::Overflow)
}

/// Adds minor unit amounts, guarding against overflow.
pub(crate) fn sum(values: impl IntoIterator<Item = i64>) -> Result<i64, AmountError> {
    values
        .into_iter()
        .try_fold(0_i64, |acc, value| acc.checked_add(value))
        .ok_or(AmountError::Overflow)
}
