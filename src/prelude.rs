//! Trolley prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    boundary::{
        Ack, BoundaryError, LocalBackend, MutationConfirmer, MutationDescriptor, OrderDraft,
        OrderSubmitter, PromoValidator,
    },
    cart::{Cart, CartBuildError, CartId, ItemLists, Mutation, MutationError},
    checkout::{Address, CheckoutGuardError, OrderReceipt, PaymentMethod},
    coordinator::{
        Boundaries, CartCoordinator, CartView, CoordinatorConfig, MutationOutcome, Phase,
    },
    delivery::{DeliveryError, DeliveryOption, DeliveryOptions},
    errors::{Action, CartError},
    items::{Addon, CartItem, ItemId, SavedItem, Variation},
    money::{AmountError, DiscountPercent, Price, Quantity, round2},
    pricing::{PricingConfig, PricingError, compute_summary, with_delivery_option},
    promo::{PromoCode, PromoDiscount, PromoRejection, PromoState},
    snapshot::{CartSnapshot, SnapshotError},
    summary::{CartSummary, SummaryPayload},
};
