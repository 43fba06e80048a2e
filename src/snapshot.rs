//! Cart Snapshots
//!
//! The serialised cart handed over by the backend: items, saved items, delivery options, addresses,
//! payment methods and any promo already applied. Amounts are decimal strings in major units
//! (`"3.99"`) in the snapshot's currency. YAML and JSON documents are both accepted.

use std::{fs, path::Path};

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{
    cart::{Cart, CartBuildError, CartId},
    checkout::{Address, PaymentMethod},
    delivery::{DeliveryError, DeliveryOption, DeliveryOptions},
    items::{Addon, CartItem, ItemId, Variation},
    money::{AmountError, DiscountPercent, Price, Quantity, find_currency, price_from_decimal},
    promo::{PromoCode, PromoDiscount, PromoState},
};

/// Snapshot loading errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error reading the snapshot file
    #[error("Failed to read snapshot file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML / JSON parsing error
    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_norway::Error),

    /// Amount string is not a decimal number
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Unknown or unsupported currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// An amount was out of range
    #[error("Invalid {what}")]
    Amount {
        /// What the amount belongs to
        what: String,

        /// Underlying validation error
        #[source]
        source: AmountError,
    },

    /// Invalid delivery option set
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Items could not be placed in the cart
    #[error(transparent)]
    Cart(#[from] CartBuildError),
}

/// A serialised cart.
#[derive(Debug, Deserialize)]
pub struct CartSnapshot {
    /// Cart id; a fresh one is generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,

    /// ISO currency code (e.g. "USD")
    pub currency: String,

    /// Priced items
    #[serde(default)]
    pub items: Vec<ItemSnapshot>,

    /// Saved-for-later items
    #[serde(default)]
    pub saved: Vec<ItemSnapshot>,

    /// Offered delivery options
    #[serde(default)]
    pub delivery_options: Vec<DeliveryOptionSnapshot>,

    /// Customer addresses
    #[serde(default)]
    pub addresses: Vec<Address>,

    /// Stored payment methods
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethod>,

    /// Promo already applied to the cart
    #[serde(default)]
    pub promo: Option<PromoSnapshot>,

    /// Promo codes a local backend should accept
    #[serde(default)]
    pub promo_codes: Vec<PromoSnapshot>,
}

/// A serialised cart item.
#[derive(Debug, Deserialize)]
pub struct ItemSnapshot {
    /// Item id
    pub id: String,

    /// Display name
    pub name: String,

    /// Base unit price (e.g. "10.00")
    pub price: String,

    /// Quantity
    #[serde(default = "one")]
    pub quantity: i64,

    /// Item discount in percent points (e.g. "10" or "10%")
    #[serde(default)]
    pub discount: Option<String>,

    /// Addons
    #[serde(default)]
    pub addons: Vec<AddonSnapshot>,

    /// Variation group -> chosen option
    #[serde(default)]
    pub variations: FxHashMap<String, VariationSnapshot>,

    /// Free-form instructions
    #[serde(default)]
    pub instructions: Option<String>,
}

/// A serialised addon.
#[derive(Debug, Deserialize)]
pub struct AddonSnapshot {
    /// Display name
    pub name: String,

    /// Unit price
    pub price: String,

    /// Quantity
    #[serde(default = "one")]
    pub quantity: i64,
}

/// A serialised variation choice.
#[derive(Debug, Deserialize)]
pub struct VariationSnapshot {
    /// Chosen option
    pub option: String,

    /// Per-unit price delta
    #[serde(default)]
    pub price_delta: Option<String>,
}

/// A serialised delivery option.
#[derive(Debug, Deserialize)]
pub struct DeliveryOptionSnapshot {
    /// Option id
    pub id: String,

    /// Display name
    pub name: String,

    /// Fee
    pub price: String,

    /// Whether the option is selected by default
    #[serde(default)]
    pub is_default: bool,
}

/// A serialised promo code.
#[derive(Debug, Deserialize)]
pub struct PromoSnapshot {
    /// Code
    pub code: String,

    /// Discount parameters
    pub discount: PromoDiscountSnapshot,

    /// Minimum subtotal
    #[serde(default)]
    pub min_order: Option<String>,

    /// Expiry instant (RFC 3339)
    #[serde(default)]
    pub expiry: Option<Timestamp>,
}

/// Serialised promo discount parameters.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromoDiscountSnapshot {
    /// Percentage of the subtotal
    Percentage {
        /// Percent points (e.g. "10")
        percent: String,
    },

    /// Fixed amount off
    Fixed {
        /// Amount (e.g. "5.00")
        amount: String,
    },

    /// Free delivery
    Shipping,
}

fn one() -> i64 {
    1
}

impl CartSnapshot {
    /// Parses a snapshot from a YAML (or JSON) document.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Parse`] if the document is malformed.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SnapshotError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Reads and parses a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// The snapshot's currency.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::UnknownCurrency`] for unknown codes and currencies without two
    /// minor digits.
    pub fn currency(&self) -> Result<&'static Currency, SnapshotError> {
        find_currency(&self.currency)
            .ok_or_else(|| SnapshotError::UnknownCurrency(self.currency.clone()))
    }

    /// Builds a validated cart. An applied promo that has expired at `now` is dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if any amount is invalid, an id is duplicated or the delivery
    /// options conflict.
    pub fn to_cart(&self, now: Timestamp) -> Result<Cart, SnapshotError> {
        let currency = self.currency()?;
        let id = self.id.map_or_else(CartId::generate, CartId::from_uuid);

        let items = self
            .items
            .iter()
            .map(|item| item.to_item(currency))
            .collect::<Result<Vec<_>, _>>()?;

        let saved = self
            .saved
            .iter()
            .map(|item| item.to_item(currency))
            .collect::<Result<Vec<_>, _>>()?;

        let delivery_options = self
            .delivery_options
            .iter()
            .map(|option| option.to_option(currency))
            .collect::<Result<Vec<_>, _>>()?;

        let promo = match &self.promo {
            Some(snapshot) => {
                let promo = snapshot.to_promo(currency)?;

                if promo.is_expired_at(now) {
                    warn!(code = promo.code(), "dropping expired promo code from snapshot");
                    PromoState::Empty
                } else {
                    PromoState::Applied(promo)
                }
            }
            None => PromoState::Empty,
        };

        Ok(Cart::new(id, currency)
            .with_items(items, saved)?
            .with_delivery_options(DeliveryOptions::new(delivery_options)?)
            .with_addresses(self.addresses.clone())
            .with_payment_methods(self.payment_methods.clone())
            .with_promo(promo))
    }

    /// Promo codes listed for a local backend.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if any promo amount is invalid.
    pub fn promo_catalogue(&self) -> Result<Vec<PromoCode>, SnapshotError> {
        let currency = self.currency()?;

        self.promo_codes
            .iter()
            .map(|promo| promo.to_promo(currency))
            .collect()
    }
}

impl ItemSnapshot {
    fn to_item(&self, currency: &'static Currency) -> Result<CartItem, SnapshotError> {
        let invalid = |source| SnapshotError::Amount {
            what: format!("item {}", self.id),
            source,
        };

        let mut item = CartItem::new(
            ItemId::new(self.id.as_str()),
            self.name.as_str(),
            parse_price(&self.price, currency)?,
        )
        .map_err(invalid)?
        .with_quantity(Quantity::new(self.quantity).map_err(invalid)?);

        if let Some(discount) = &self.discount {
            item = item.with_discount(DiscountPercent::new(parse_points(discount)?).map_err(invalid)?);
        }

        for addon in &self.addons {
            let quantity = Quantity::new(addon.quantity).map_err(invalid)?;

            item = item.with_addon(
                Addon::new(
                    addon.name.as_str(),
                    parse_price(&addon.price, currency)?,
                    quantity,
                )
                .map_err(invalid)?,
            );
        }

        for (group, variation) in &self.variations {
            let choice = match &variation.price_delta {
                Some(delta) => {
                    Variation::priced(variation.option.as_str(), parse_price(delta, currency)?)
                        .map_err(invalid)?
                }
                None => Variation::new(variation.option.as_str()),
            };

            item = item.with_variation(group.as_str(), choice);
        }

        if let Some(instructions) = &self.instructions {
            item = item.with_instructions(instructions.as_str());
        }

        Ok(item)
    }
}

impl DeliveryOptionSnapshot {
    fn to_option(&self, currency: &'static Currency) -> Result<DeliveryOption, SnapshotError> {
        let option = DeliveryOption::new(
            self.id.as_str(),
            self.name.as_str(),
            parse_price(&self.price, currency)?,
        )
        .map_err(|source| SnapshotError::Amount {
            what: format!("delivery option {}", self.id),
            source,
        })?;

        Ok(if self.is_default {
            option.default_option()
        } else {
            option
        })
    }
}

impl PromoSnapshot {
    fn to_promo(&self, currency: &'static Currency) -> Result<PromoCode, SnapshotError> {
        let invalid = |source| SnapshotError::Amount {
            what: format!("promo {}", self.code),
            source,
        };

        let discount = match &self.discount {
            PromoDiscountSnapshot::Percentage { percent } => PromoDiscount::Percentage(
                DiscountPercent::new(parse_points(percent)?).map_err(invalid)?,
            ),
            PromoDiscountSnapshot::Fixed { amount } => {
                PromoDiscount::Fixed(parse_price(amount, currency)?)
            }
            PromoDiscountSnapshot::Shipping => PromoDiscount::Shipping,
        };

        let min_order = match &self.min_order {
            Some(amount) => parse_price(amount, currency)?,
            None => Money::from_minor(0, currency),
        };

        let promo = PromoCode::new(&self.code, discount, min_order).map_err(invalid)?;

        Ok(match self.expiry {
            Some(expiry) => promo.with_expiry(expiry),
            None => promo,
        })
    }
}

/// Parses a major-unit amount string (e.g. "3.99") into a non-negative price.
///
/// # Errors
///
/// Returns [`SnapshotError::InvalidAmount`] if the string is not a decimal number, or
/// [`SnapshotError::Amount`] if it is negative or has sub-minor precision.
pub fn parse_price(value: &str, currency: &'static Currency) -> Result<Price, SnapshotError> {
    let amount = value
        .trim()
        .parse::<Decimal>()
        .map_err(|_err| SnapshotError::InvalidAmount(value.to_string()))?;

    price_from_decimal(amount, currency).map_err(|source| SnapshotError::Amount {
        what: format!("amount {value}"),
        source,
    })
}

/// Parses percent points, with or without a trailing `%` ("15%" and "15" are both 15%).
fn parse_points(value: &str) -> Result<Decimal, SnapshotError> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);

    trimmed
        .trim()
        .parse::<Decimal>()
        .map_err(|_err| SnapshotError::InvalidAmount(value.to_string()))
}
