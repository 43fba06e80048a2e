//! Checkout
//!
//! Addresses, payment methods and the precondition guard run before an order is submitted.

use serde::Deserialize;
use thiserror::Error;

use crate::items::CartItem;

/// Checkout preconditions, reported in priority order.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CheckoutGuardError {
    /// The cart has no items.
    #[error("cart is empty")]
    EmptyCart,

    /// No delivery address is selected.
    #[error("no delivery address selected")]
    NoDeliveryAddress,

    /// No payment method is selected.
    #[error("no payment method selected")]
    NoPaymentMethod,
}

/// A delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Address {
    /// Address id
    pub id: String,

    /// Label shown to the customer (e.g. "Home")
    pub label: String,

    /// Address lines
    #[serde(default)]
    pub lines: Vec<String>,

    /// Postal code
    pub postcode: String,

    /// Whether this address is preselected
    #[serde(default)]
    pub is_default: bool,
}

/// A stored payment method.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentMethod {
    /// Payment method id
    pub id: String,

    /// Label shown to the customer (e.g. "Visa •••• 4242")
    pub label: String,

    /// Whether this method is preselected
    #[serde(default)]
    pub is_default: bool,
}

/// Confirmation returned by the order submission boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    /// Server-assigned order id
    pub order_id: String,
}

/// Finds the preselected entry of a list: the flagged default, else none.
pub(crate) fn default_id<'a, T>(
    entries: &'a [T],
    is_default: impl Fn(&T) -> bool,
    id: impl Fn(&'a T) -> &'a str,
) -> Option<String> {
    entries
        .iter()
        .find(|entry| is_default(entry))
        .map(|entry| id(entry).to_string())
}

/// Validates checkout preconditions without touching the network.
///
/// # Errors
///
/// Returns the highest-priority failed precondition.
pub fn guard<'a>(
    items: &[CartItem],
    address: Option<&'a Address>,
    payment: Option<&'a PaymentMethod>,
) -> Result<(&'a Address, &'a PaymentMethod), CheckoutGuardError> {
    if items.is_empty() {
        return Err(CheckoutGuardError::EmptyCart);
    }

    let address = address.ok_or(CheckoutGuardError::NoDeliveryAddress)?;
    let payment = payment.ok_or(CheckoutGuardError::NoPaymentMethod)?;

    Ok((address, payment))
}
