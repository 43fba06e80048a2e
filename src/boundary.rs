//! External boundaries.
//!
//! The engine talks to the backend through three traits: mutation confirmation, promo validation
//! and order submission. Transport is up to the implementation.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    cart::{CartId, Mutation},
    checkout::{Address, OrderReceipt, PaymentMethod},
    items::CartItem,
    money::Price,
    promo::{PromoCode, PromoRejection, normalize_code},
    summary::CartSummary,
};

/// Failure reported by (or on behalf of) a boundary call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoundaryError {
    /// The server refused the request.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The server could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// No answer arrived within the configured timeout.
    #[error("no response within {0:?}")]
    TimedOut(Duration),
}

/// A mutation as sent for confirmation. `(cart, seq)` identifies it, so resending is safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationDescriptor {
    /// Per-cart sequence number
    pub seq: u64,

    /// The normalised mutation
    pub mutation: Mutation,
}

/// Positive confirmation of a mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ack;

/// Everything about the cart the order submission needs besides address and payment.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    /// Cart being checked out
    pub cart: CartId,

    /// Priced items
    pub items: Vec<CartItem>,

    /// Summary the customer saw
    pub summary: CartSummary,

    /// Selected delivery option id
    pub delivery_option: Option<String>,
}

/// Confirms optimistic mutations.
#[automock]
#[async_trait]
pub trait MutationConfirmer: Send + Sync {
    /// Confirm a mutation already applied locally.
    async fn confirm_mutation(
        &self,
        cart: CartId,
        mutation: MutationDescriptor,
    ) -> Result<Ack, BoundaryError>;
}

/// Validates promo codes.
#[automock]
#[async_trait]
pub trait PromoValidator: Send + Sync {
    /// Validate `code` against the current subtotal.
    async fn validate_promo(
        &self,
        code: String,
        subtotal: Price,
    ) -> Result<PromoCode, PromoRejection>;
}

/// Submits orders.
#[automock]
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Place the order.
    async fn submit_order(
        &self,
        order: OrderDraft,
        address: Address,
        payment_method: PaymentMethod,
    ) -> Result<OrderReceipt, BoundaryError>;
}

/// An in-process backend: acknowledges every mutation, validates codes against a fixed
/// catalogue and accepts every order.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    promos: FxHashMap<String, PromoCode>,
}

impl LocalBackend {
    /// Creates a backend that knows the given promo codes.
    pub fn new(promos: impl IntoIterator<Item = PromoCode>) -> Self {
        Self {
            promos: promos
                .into_iter()
                .map(|promo| (promo.code().to_string(), promo))
                .collect(),
        }
    }
}

#[async_trait]
impl MutationConfirmer for LocalBackend {
    async fn confirm_mutation(
        &self,
        _cart: CartId,
        _mutation: MutationDescriptor,
    ) -> Result<Ack, BoundaryError> {
        Ok(Ack)
    }
}

#[async_trait]
impl PromoValidator for LocalBackend {
    async fn validate_promo(
        &self,
        code: String,
        subtotal: Price,
    ) -> Result<PromoCode, PromoRejection> {
        let promo = self
            .promos
            .get(&normalize_code(&code))
            .ok_or(PromoRejection::NotFound)?;

        if !promo.qualifies(subtotal.to_minor_units()) {
            return Err(PromoRejection::BelowMinimumOrder {
                min_order: *promo.min_order(),
            });
        }

        Ok(promo.clone())
    }
}

#[async_trait]
impl OrderSubmitter for LocalBackend {
    async fn submit_order(
        &self,
        _order: OrderDraft,
        _address: Address,
        _payment_method: PaymentMethod,
    ) -> Result<OrderReceipt, BoundaryError> {
        Ok(OrderReceipt {
            order_id: Uuid::now_v7().to_string(),
        })
    }
}
