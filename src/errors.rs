//! Cart operation errors.

use std::fmt;

use thiserror::Error;
use tokio::task::JoinError;

use crate::{
    boundary::BoundaryError,
    cart::{Mutation, MutationError},
    checkout::CheckoutGuardError,
    items::ItemId,
    money::AmountError,
    pricing::PricingError,
    promo::{PromoFlowError, PromoRejection},
};

/// The user action an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Change an item's quantity
    ChangeQuantity,
    /// Remove an item
    RemoveItem,
    /// Save an item for later
    SaveForLater,
    /// Move a saved item into the cart
    MoveToCart,
    /// Select a delivery option
    SelectDeliveryOption,
    /// Select a delivery address
    SelectAddress,
    /// Select a payment method
    SelectPaymentMethod,
    /// Type into the promo input
    EnterPromo,
    /// Apply a promo code
    ApplyPromo,
    /// Remove the applied promo code
    RemovePromo,
    /// Submit the order
    Checkout,
}

impl Action {
    /// Stable snake-case name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::ChangeQuantity => "change_quantity",
            Action::RemoveItem => "remove_item",
            Action::SaveForLater => "save_for_later",
            Action::MoveToCart => "move_to_cart",
            Action::SelectDeliveryOption => "select_delivery_option",
            Action::SelectAddress => "select_address",
            Action::SelectPaymentMethod => "select_payment_method",
            Action::EnterPromo => "enter_promo",
            Action::ApplyPromo => "apply_promo",
            Action::RemovePromo => "remove_promo",
            Action::Checkout => "checkout",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&Mutation> for Action {
    fn from(mutation: &Mutation) -> Self {
        match mutation {
            Mutation::ChangeQuantity { .. } => Action::ChangeQuantity,
            Mutation::RemoveItem { .. } => Action::RemoveItem,
            Mutation::SaveForLater { .. } => Action::SaveForLater,
            Mutation::MoveToCart { .. } => Action::MoveToCart,
        }
    }
}

/// Errors surfaced by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A quantity, price or percentage was out of range.
    #[error("{action}: invalid amount")]
    InvalidAmount {
        /// Attempted action
        action: Action,
        /// Target item, if any
        item: Option<ItemId>,
        /// Underlying validation error
        #[source]
        source: AmountError,
    },

    /// The target item is not where the action expects it.
    #[error("{action}: {source}")]
    ItemNotFound {
        /// Attempted action
        action: Action,
        /// Target item
        item: ItemId,
        /// Which list was searched
        #[source]
        source: MutationError,
    },

    /// The item would end up in the same list twice.
    #[error("{action}: {source}")]
    DuplicateItem {
        /// Attempted action
        action: Action,
        /// Target item
        item: ItemId,
        /// Which list already holds it
        #[source]
        source: MutationError,
    },

    /// The delivery option is not offered for this cart.
    #[error("unknown delivery option: {0}")]
    UnknownDeliveryOption(String),

    /// The address is not one of the customer's addresses.
    #[error("unknown address: {0}")]
    UnknownAddress(String),

    /// The payment method is not one of the customer's methods.
    #[error("unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// Another operation on this cart must finish first.
    #[error("{action}: another cart operation is in progress")]
    MutationInProgress {
        /// Attempted action
        action: Action,
    },

    /// The confirmation boundary refused the mutation; the cart has already been rolled back.
    #[error("{action} on item {item} was rejected and rolled back")]
    MutationRejected {
        /// Attempted action
        action: Action,
        /// Target item
        item: ItemId,
        /// Sequence number of the rejected mutation
        seq: u64,
        /// Why the confirmation failed
        #[source]
        source: BoundaryError,
    },

    /// The promo code was blank.
    #[error("promo code is empty")]
    EmptyCode,

    /// A promo code is already applied.
    #[error("promo code {0} is already applied; remove it first")]
    PromoAlreadyApplied(String),

    /// The promo code was refused.
    #[error("promo code {code} is invalid: {reason}")]
    InvalidPromoCode {
        /// The code that was tried
        code: String,
        /// Server-supplied reason
        #[source]
        reason: PromoRejection,
    },

    /// Checkout attempted on an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Checkout attempted without a delivery address.
    #[error("no delivery address selected")]
    NoDeliveryAddress,

    /// Checkout attempted without a payment method.
    #[error("no payment method selected")]
    NoPaymentMethod,

    /// Order submission failed; the cart is untouched.
    #[error("checkout failed")]
    CheckoutFailed(#[source] BoundaryError),

    /// The task finishing the operation was cancelled, e.g. by runtime shutdown.
    #[error("{action}: interrupted")]
    Interrupted {
        /// Attempted action
        action: Action,
        /// Why the task did not finish
        #[source]
        source: JoinError,
    },

    /// The cart could not be priced.
    #[error("{action}: pricing failed")]
    Pricing {
        /// Attempted action
        action: Action,
        /// Underlying pricing error
        #[source]
        source: PricingError,
    },
}

impl CartError {
    /// Wraps an item transform error with the action and item it came from.
    pub(crate) fn from_mutation(mutation: &Mutation, error: MutationError) -> Self {
        let action = Action::from(mutation);
        let item = mutation.item().clone();

        match error {
            MutationError::Amount(source) => CartError::InvalidAmount {
                action,
                item: Some(item),
                source,
            },
            source @ (MutationError::ItemNotFound(_) | MutationError::SavedItemNotFound(_)) => {
                CartError::ItemNotFound {
                    action,
                    item,
                    source,
                }
            }
            source @ (MutationError::AlreadyInCart(_) | MutationError::AlreadySaved(_)) => {
                CartError::DuplicateItem {
                    action,
                    item,
                    source,
                }
            }
        }
    }

    /// Maps a refused promo transition.
    pub(crate) fn from_promo_flow(action: Action, error: PromoFlowError) -> Self {
        match error {
            PromoFlowError::EmptyCode => CartError::EmptyCode,
            PromoFlowError::AlreadyApplied(code) => CartError::PromoAlreadyApplied(code),
            PromoFlowError::Validating(_) => CartError::MutationInProgress { action },
        }
    }

    /// Wraps a pricing error with the action that triggered the recomputation.
    pub(crate) fn pricing(action: Action) -> impl FnOnce(PricingError) -> Self {
        move |source| CartError::Pricing { action, source }
    }

    /// Whether the failure should be shown to the user as a notification.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            CartError::Pricing { .. } | CartError::Interrupted { .. }
        )
    }
}

impl From<CheckoutGuardError> for CartError {
    fn from(error: CheckoutGuardError) -> Self {
        match error {
            CheckoutGuardError::EmptyCart => CartError::EmptyCart,
            CheckoutGuardError::NoDeliveryAddress => CartError::NoDeliveryAddress,
            CheckoutGuardError::NoPaymentMethod => CartError::NoPaymentMethod,
        }
    }
}
