//! Promo Codes
//!
//! A promo code is validated by the server; the engine only consumes the result shape and applies
//! it during pricing. At most one code is applied to a cart at a time.

use std::fmt;

use jiff::Timestamp;
use rusty_money::iso::Currency;
use thiserror::Error;

use crate::money::{self, AmountError, DiscountPercent, Price};

pub mod protocol;

pub use protocol::{PromoFlowError, PromoState};

/// Normalises user input into the stored form of a promo code.
pub fn normalize_code(input: &str) -> String {
    input.trim().to_uppercase()
}

/// What a promo code takes off the order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromoDiscount {
    /// A percentage of the subtotal.
    Percentage(DiscountPercent),

    /// A fixed amount, capped at the subtotal.
    Fixed(Price),

    /// Free delivery.
    Shipping,
}

/// A server-validated promo code.
#[derive(Debug, Clone, PartialEq)]
pub struct PromoCode {
    code: String,
    discount: PromoDiscount,
    min_order: Price,
    expiry: Option<Timestamp>,
}

impl PromoCode {
    /// Creates a promo code; the code is stored upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::NegativePrice`] if the minimum order or a fixed discount is negative.
    pub fn new(
        code: &str,
        discount: PromoDiscount,
        min_order: Price,
    ) -> Result<Self, AmountError> {
        if let PromoDiscount::Fixed(amount) = discount {
            money::non_negative(amount)?;
        }

        Ok(Self {
            code: normalize_code(code),
            discount,
            min_order: money::non_negative(min_order)?,
            expiry: None,
        })
    }

    /// Sets the instant after which the code no longer applies.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Timestamp) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Upper-cased code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Discount parameters
    pub fn discount(&self) -> PromoDiscount {
        self.discount
    }

    /// Subtotal floor below which the code does not apply
    pub fn min_order(&self) -> &Price {
        &self.min_order
    }

    /// Expiry instant, if any
    pub fn expiry(&self) -> Option<Timestamp> {
        self.expiry
    }

    /// Whether the code has expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    /// Whether a subtotal (in minor units) reaches the minimum order.
    pub fn qualifies(&self, subtotal_minor: i64) -> bool {
        subtotal_minor >= self.min_order.to_minor_units()
    }

    /// Currency of any monetary parameters.
    pub fn currency(&self) -> &'static Currency {
        self.min_order.currency()
    }
}

impl fmt::Display for PromoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Why the promo validation boundary refused a code.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PromoRejection {
    /// No such code.
    #[error("promo code not found")]
    NotFound,

    /// The subtotal is below the code's minimum order.
    #[error("order is below the minimum of {min_order}")]
    BelowMinimumOrder {
        /// Minimum order for the code
        min_order: Price,
    },

    /// The code has expired.
    #[error("promo code has expired")]
    Expired,

    /// Any other server-supplied reason.
    #[error("{0}")]
    Other(String),

    /// The validation service could not be reached or did not answer in time.
    #[error("promo validation unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn code_is_stored_upper_cased() -> TestResult {
        let promo = PromoCode::new(
            " save5 ",
            PromoDiscount::Fixed(Money::from_minor(5_00, USD)),
            Money::from_minor(15_00, USD),
        )?;

        assert_eq!(promo.code(), "SAVE5");

        Ok(())
    }

    #[test]
    fn qualifies_at_exact_minimum() -> TestResult {
        let promo =
            PromoCode::new("FREESHIP", PromoDiscount::Shipping, Money::from_minor(20_00, USD))?;

        assert!(promo.qualifies(20_00));
        assert!(!promo.qualifies(19_99));

        Ok(())
    }

    #[test]
    fn expiry_is_inclusive() -> TestResult {
        let now = Timestamp::now();
        let promo = PromoCode::new("OLD", PromoDiscount::Shipping, Money::from_minor(0, USD))?
            .with_expiry(now);

        assert!(promo.is_expired_at(now));
        assert!(!promo.is_expired_at(now - SignedDuration::from_secs(1)));

        Ok(())
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let negative = Money::from_minor(-5_00, USD);

        assert_eq!(
            PromoCode::new("OWE5", PromoDiscount::Fixed(negative), Money::from_minor(0, USD)),
            Err(AmountError::NegativePrice(-5_00))
        );
        assert_eq!(
            PromoCode::new("SHIP", PromoDiscount::Shipping, negative),
            Err(AmountError::NegativePrice(-5_00))
        );
    }
}
