//! Published cart views.

use crate::{
    cart::{Cart, CartId},
    items::{CartItem, SavedItem},
    promo::PromoState,
    summary::CartSummary,
};

/// What the coordinator is doing for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing outstanding.
    Idle,

    /// A mutation's confirmation is outstanding.
    Mutating {
        /// Sequence number of the latest mutation
        seq: u64,
    },

    /// An order submission is outstanding.
    CheckingOut,
}

/// A consistent snapshot of a cart: items and the summary priced from exactly those items.
#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    /// Cart id
    pub cart: CartId,

    /// Increments on every publish
    pub revision: u64,

    /// Coordinator phase at publish time
    pub phase: Phase,

    /// Priced items
    pub items: Vec<CartItem>,

    /// Saved-for-later items
    pub saved: Vec<SavedItem>,

    /// Summary priced from `items`
    pub summary: CartSummary,

    /// Selected delivery option id
    pub delivery_option: Option<String>,

    /// Selected address id
    pub address: Option<String>,

    /// Selected payment method id
    pub payment_method: Option<String>,

    /// Promo entry state
    pub promo: PromoState,
}

impl CartView {
    pub(super) fn capture(cart: &Cart, summary: &CartSummary, revision: u64, phase: Phase) -> Self {
        Self {
            cart: cart.id(),
            revision,
            phase,
            items: cart.items().to_vec(),
            saved: cart.saved().to_vec(),
            summary: summary.clone(),
            delivery_option: cart.selected_delivery().map(|option| option.id.clone()),
            address: cart.selected_address().map(|address| address.id.clone()),
            payment_method: cart.selected_payment().map(|method| method.id.clone()),
            promo: cart.promo().clone(),
        }
    }

    /// The item/summary pair, ignoring bookkeeping such as revision and phase.
    pub fn priced(&self) -> (&[CartItem], &[SavedItem], &CartSummary) {
        (&self.items, &self.saved, &self.summary)
    }

    /// Whether nothing is outstanding.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }
}
