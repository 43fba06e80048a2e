//! Pricing
//!
//! Computes a [`CartSummary`] from a cart's items, selected delivery option and applied promo.
//! The steps run in a fixed order:
//!
//! 1. line totals (base price and variation deltas times quantity, plus addons)
//! 2. item discounts on the full line total
//! 3. subtotal, the sum of line totals
//! 4. item discount total
//! 5. promo discount, if the subtotal reaches the promo's minimum order
//! 6. tax on `subtotal - item discounts`, before the promo discount
//! 7. delivery fee, zeroed by a qualifying shipping promo
//! 8. service fee
//! 9. total, floored at zero

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    delivery::DeliveryOption,
    items::CartItem,
    money::{self, AmountError, Price, percent_of_minor},
    promo::{PromoCode, PromoDiscount},
    summary::CartSummary,
};

/// Errors that can occur while pricing a cart.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// An amount's currency differs from the cart currency (what, amount currency, cart currency).
    #[error("{0} has currency {1}, but the cart has currency {2}")]
    CurrencyMismatch(String, &'static str, &'static str),

    /// Wrapped minor unit arithmetic error.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Pricing constants.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    /// Currency every amount must be in
    pub currency: &'static Currency,

    /// Tax rate as a fraction (0.08 is 8%)
    pub tax_rate: Decimal,

    /// Flat service fee
    pub service_fee: Price,

    /// Delivery fee charged when no delivery option is selected
    pub fallback_delivery_fee: Price,
}

impl PricingConfig {
    /// Default constants in the given currency: 8% tax, 1.99 service fee, 3.99 delivery.
    pub fn for_currency(currency: &'static Currency) -> Self {
        Self {
            currency,
            tax_rate: Decimal::new(8, 2),
            service_fee: Money::from_minor(1_99, currency),
            fallback_delivery_fee: Money::from_minor(3_99, currency),
        }
    }

    fn money(&self, minor: i64) -> Price {
        Money::from_minor(minor, self.currency)
    }

    fn ensure_currency(&self, what: impl FnOnce() -> String, price: &Price) -> Result<(), PricingError> {
        if price.currency() == self.currency {
            Ok(())
        } else {
            Err(PricingError::CurrencyMismatch(
                what(),
                price.currency().iso_alpha_code,
                self.currency.iso_alpha_code,
            ))
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self::for_currency(rusty_money::iso::USD)
    }
}

/// Computes the summary for a set of items.
///
/// Pure and order-independent: permuting `items` yields an identical summary.
///
/// # Errors
///
/// - [`PricingError::CurrencyMismatch`]: an amount is not in the configured currency.
/// - [`PricingError::Amount`]: minor unit arithmetic overflowed.
pub fn compute_summary(
    items: &[CartItem],
    delivery: Option<&DeliveryOption>,
    promo: Option<&PromoCode>,
    config: &PricingConfig,
) -> Result<CartSummary, PricingError> {
    let mut line_totals = Vec::with_capacity(items.len());
    let mut item_discounts = Vec::with_capacity(items.len());

    for item in items {
        ensure_item_currency(item, config)?;

        line_totals.push(item.line_total_minor()?);
        item_discounts.push(item.discount_minor()?);
    }

    let subtotal = money::sum(line_totals)?;
    let item_discount_total = money::sum(item_discounts)?;

    if let Some(promo) = promo {
        ensure_promo_currency(promo, config)?;
    }

    let promo_applied = promo.is_some_and(|promo| promo.qualifies(subtotal));
    let promo_discount = promo_discount_minor(subtotal, promo)?;

    let tax = tax_minor(subtotal, item_discount_total, config)?;

    let terms = Terms {
        subtotal,
        item_discount_total,
        promo_discount,
        tax,
    };

    terms.into_summary(delivery, promo, promo_applied, config)
}

/// Re-prices a summary for a different delivery option without re-deriving item totals.
///
/// The delivery fee is additive and independent of the other terms, so this equals calling
/// [`compute_summary`] with the same items, `delivery` and `promo`.
///
/// # Errors
///
/// Same as [`compute_summary`].
pub fn with_delivery_option(
    summary: &CartSummary,
    delivery: Option<&DeliveryOption>,
    promo: Option<&PromoCode>,
    config: &PricingConfig,
) -> Result<CartSummary, PricingError> {
    let terms = Terms {
        subtotal: summary.subtotal.to_minor_units(),
        item_discount_total: summary.item_discount_total.to_minor_units(),
        promo_discount: summary.promo_discount.to_minor_units(),
        tax: summary.tax.to_minor_units(),
    };

    terms.into_summary(delivery, promo, summary.promo_applied, config)
}

/// The item-derived terms of a summary, in minor units.
struct Terms {
    subtotal: i64,
    item_discount_total: i64,
    promo_discount: i64,
    tax: i64,
}

impl Terms {
    fn into_summary(
        self,
        delivery: Option<&DeliveryOption>,
        promo: Option<&PromoCode>,
        promo_applied: bool,
        config: &PricingConfig,
    ) -> Result<CartSummary, PricingError> {
        if let Some(option) = delivery {
            config.ensure_currency(|| format!("delivery option {}", option.id), &option.price)?;
        }

        let free_shipping =
            promo_applied && promo.is_some_and(|promo| promo.discount() == PromoDiscount::Shipping);

        let delivery_fee = if free_shipping {
            0
        } else {
            delivery
                .map_or(config.fallback_delivery_fee, |option| option.price)
                .to_minor_units()
        };

        let service_fee = config.service_fee.to_minor_units();

        let total = self
            .subtotal
            .checked_sub(self.item_discount_total)
            .and_then(|value| value.checked_sub(self.promo_discount))
            .and_then(|value| value.checked_add(self.tax))
            .and_then(|value| value.checked_add(delivery_fee))
            .and_then(|value| value.checked_add(service_fee))
            .ok_or(AmountError::Overflow)?
            .max(0);

        Ok(CartSummary {
            subtotal: config.money(self.subtotal),
            item_discount_total: config.money(self.item_discount_total),
            promo_discount: config.money(self.promo_discount),
            tax: config.money(self.tax),
            delivery_fee: config.money(delivery_fee),
            service_fee: config.money(service_fee),
            total: config.money(total),
            promo_applied,
            promo_code: promo.map(|promo| promo.code().to_string()),
        })
    }
}

fn ensure_item_currency(item: &CartItem, config: &PricingConfig) -> Result<(), PricingError> {
    config.ensure_currency(|| format!("item {}", item.id()), item.base_price())?;

    for addon in item.addons() {
        config.ensure_currency(
            || format!("addon {} on item {}", addon.name(), item.id()),
            addon.unit_price(),
        )?;
    }

    for (group, variation) in item.variations() {
        if let Some(delta) = &variation.price_delta {
            config.ensure_currency(|| format!("variation {group} on item {}", item.id()), delta)?;
        }
    }

    Ok(())
}

fn ensure_promo_currency(promo: &PromoCode, config: &PricingConfig) -> Result<(), PricingError> {
    config.ensure_currency(|| format!("promo {}", promo.code()), promo.min_order())?;

    if let PromoDiscount::Fixed(amount) = promo.discount() {
        config.ensure_currency(|| format!("promo {}", promo.code()), &amount)?;
    }

    Ok(())
}

fn promo_discount_minor(subtotal: i64, promo: Option<&PromoCode>) -> Result<i64, PricingError> {
    let Some(promo) = promo.filter(|promo| promo.qualifies(subtotal)) else {
        return Ok(0);
    };

    Ok(match promo.discount() {
        PromoDiscount::Percentage(percent) => percent_of_minor(&percent.as_percentage(), subtotal)?,
        PromoDiscount::Fixed(amount) => amount.to_minor_units().min(subtotal),
        PromoDiscount::Shipping => 0,
    })
}

fn tax_minor(
    subtotal: i64,
    item_discount_total: i64,
    config: &PricingConfig,
) -> Result<i64, PricingError> {
    let taxable = subtotal
        .checked_sub(item_discount_total)
        .ok_or(AmountError::Overflow)?;

    Ok(percent_of_minor(&Percentage::from(config.tax_rate), taxable)?)
}
