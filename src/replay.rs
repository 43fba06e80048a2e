//! Scripted Replay
//!
//! Parses user actions from short text steps (`quantity:pad-thai:3`, `promo:SAVE5`, `checkout`)
//! and runs them against a coordinator.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::{
    coordinator::{CartCoordinator, MutationOutcome},
    errors::CartError,
    items::ItemId,
};

/// Step parsing errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepParseError {
    /// The verb is not a known action
    #[error("unknown step: {0}")]
    UnknownStep(String),

    /// The step is missing an argument
    #[error("step {0} expects an argument")]
    MissingArgument(String),

    /// The quantity is not an integer
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),
}

/// One scripted user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `quantity:<item>:<n>`
    ChangeQuantity {
        /// Target item
        item: ItemId,
        /// Requested quantity
        quantity: i64,
    },

    /// `remove:<item>`
    RemoveItem(ItemId),

    /// `save:<item>`
    SaveForLater(ItemId),

    /// `move:<item>`
    MoveToCart(ItemId),

    /// `delivery:<option>`
    SelectDeliveryOption(String),

    /// `address:<id>`
    SelectAddress(String),

    /// `payment:<id>`
    SelectPaymentMethod(String),

    /// `promo:<code>`
    ApplyPromo(String),

    /// `remove-promo`
    RemovePromo,

    /// `checkout`
    Checkout,
}

impl FromStr for Step {
    type Err = StepParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, argument) = match s.split_once(':') {
            Some((verb, argument)) => (verb, Some(argument)),
            None => (s, None),
        };

        let required = || {
            argument
                .filter(|argument| !argument.is_empty())
                .ok_or_else(|| StepParseError::MissingArgument(verb.to_string()))
        };

        Ok(match verb {
            "quantity" => {
                let (item, quantity) = required()?
                    .rsplit_once(':')
                    .ok_or_else(|| StepParseError::MissingArgument(verb.to_string()))?;

                let quantity = quantity
                    .parse::<i64>()
                    .map_err(|_err| StepParseError::InvalidQuantity(quantity.to_string()))?;

                Step::ChangeQuantity {
                    item: ItemId::new(item),
                    quantity,
                }
            }
            "remove" => Step::RemoveItem(ItemId::new(required()?)),
            "save" => Step::SaveForLater(ItemId::new(required()?)),
            "move" => Step::MoveToCart(ItemId::new(required()?)),
            "delivery" => Step::SelectDeliveryOption(required()?.to_string()),
            "address" => Step::SelectAddress(required()?.to_string()),
            "payment" => Step::SelectPaymentMethod(required()?.to_string()),
            "promo" => Step::ApplyPromo(required()?.to_string()),
            "remove-promo" => Step::RemovePromo,
            "checkout" => Step::Checkout,
            other => return Err(StepParseError::UnknownStep(other.to_string())),
        })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::ChangeQuantity { item, quantity } => write!(f, "quantity:{item}:{quantity}"),
            Step::RemoveItem(item) => write!(f, "remove:{item}"),
            Step::SaveForLater(item) => write!(f, "save:{item}"),
            Step::MoveToCart(item) => write!(f, "move:{item}"),
            Step::SelectDeliveryOption(id) => write!(f, "delivery:{id}"),
            Step::SelectAddress(id) => write!(f, "address:{id}"),
            Step::SelectPaymentMethod(id) => write!(f, "payment:{id}"),
            Step::ApplyPromo(code) => write!(f, "promo:{code}"),
            Step::RemovePromo => f.write_str("remove-promo"),
            Step::Checkout => f.write_str("checkout"),
        }
    }
}

impl Step {
    /// Runs the step and describes what happened.
    ///
    /// # Errors
    ///
    /// Returns the [`CartError`] of the underlying coordinator operation.
    pub async fn run(&self, coordinator: &CartCoordinator) -> Result<String, CartError> {
        Ok(match self {
            Step::ChangeQuantity { item, quantity } => {
                describe(coordinator.change_quantity(item.clone(), *quantity).await?)
            }
            Step::RemoveItem(item) => describe(coordinator.remove_item(item.clone()).await?),
            Step::SaveForLater(item) => describe(coordinator.save_for_later(item.clone()).await?),
            Step::MoveToCart(item) => describe(coordinator.move_to_cart(item.clone()).await?),
            Step::SelectDeliveryOption(id) => {
                let view = coordinator.select_delivery_option(id).await?;
                format!("delivery fee now {}", view.summary.delivery_fee)
            }
            Step::SelectAddress(id) => {
                coordinator.select_address(id).await?;
                format!("address {id} selected")
            }
            Step::SelectPaymentMethod(id) => {
                coordinator.select_payment_method(id).await?;
                format!("payment method {id} selected")
            }
            Step::ApplyPromo(code) => {
                let view = coordinator.apply_promo(code).await?;
                format!("promo applied, saving {}", view.summary.promo_discount)
            }
            Step::RemovePromo => {
                coordinator.remove_promo().await?;
                "promo removed".to_string()
            }
            Step::Checkout => {
                let receipt = coordinator.checkout().await?;
                format!("order {} placed", receipt.order_id)
            }
        })
    }
}

fn describe(outcome: MutationOutcome) -> String {
    match outcome {
        MutationOutcome::Confirmed { seq } => format!("mutation {seq} confirmed"),
        MutationOutcome::Superseded { seq } => format!("mutation {seq} superseded"),
    }
}
