//! Boundary doubles with controllable latency, plus a ready-made cart.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::USD};
use testresult::TestResult;
use tokio::time::sleep;
use trolley::prelude::*;

pub fn usd(minor: i64) -> Price {
    Money::from_minor(minor, USD)
}

/// Two discounted Pad Thai, one saved dessert, two delivery options, address and payment set.
pub fn cart() -> TestResult<Cart> {
    let pad_thai = CartItem::new("pad-thai", "Pad Thai", usd(10_00))?
        .with_quantity(Quantity::new(2)?)
        .with_discount(DiscountPercent::new(Decimal::TEN)?);

    let dessert = CartItem::new("mango-rice", "Mango Sticky Rice", usd(6_00))?;

    Ok(Cart::new(CartId::generate(), USD)
        .with_items([pad_thai], [dessert])?
        .with_delivery_options(DeliveryOptions::new([
            DeliveryOption::new("standard", "Standard", usd(3_99))?.default_option(),
            DeliveryOption::new("express", "Express", usd(7_99))?,
        ])?)
        .with_addresses(vec![Address {
            id: "home".to_string(),
            label: "Home".to_string(),
            lines: vec!["1 High Street".to_string()],
            postcode: "AB1 2CD".to_string(),
            is_default: true,
        }])
        .with_payment_methods(vec![PaymentMethod {
            id: "visa".to_string(),
            label: "Visa".to_string(),
            is_default: true,
        }]))
}

pub fn coordinator(
    cart: Cart,
    confirmer: impl MutationConfirmer + 'static,
    validator: impl PromoValidator + 'static,
    submitter: impl OrderSubmitter + 'static,
) -> TestResult<CartCoordinator> {
    Ok(CartCoordinator::new(
        cart,
        PricingConfig::default(),
        CoordinatorConfig {
            boundary_timeout: Duration::from_secs(1),
        },
        Boundaries {
            confirmer: Arc::new(confirmer),
            validator: Arc::new(validator),
            submitter: Arc::new(submitter),
        },
    )?)
}

/// Answers each confirmation after a delay chosen per mutation.
pub struct ScriptedConfirmer<F> {
    script: F,
}

impl<F> ScriptedConfirmer<F>
where
    F: Fn(&MutationDescriptor) -> (Duration, Result<Ack, BoundaryError>) + Send + Sync,
{
    pub fn new(script: F) -> Self {
        Self { script }
    }
}

#[async_trait]
impl<F> MutationConfirmer for ScriptedConfirmer<F>
where
    F: Fn(&MutationDescriptor) -> (Duration, Result<Ack, BoundaryError>) + Send + Sync,
{
    async fn confirm_mutation(
        &self,
        _cart: CartId,
        mutation: MutationDescriptor,
    ) -> Result<Ack, BoundaryError> {
        let (delay, result) = (self.script)(&mutation);
        sleep(delay).await;
        result
    }
}

/// Validates every code after a fixed delay.
pub struct SlowValidator {
    pub delay: Duration,
    pub result: Result<PromoCode, PromoRejection>,
}

#[async_trait]
impl PromoValidator for SlowValidator {
    async fn validate_promo(
        &self,
        _code: String,
        _subtotal: Price,
    ) -> Result<PromoCode, PromoRejection> {
        sleep(self.delay).await;
        self.result.clone()
    }
}

/// Submits every order after a fixed delay.
pub struct SlowSubmitter {
    pub delay: Duration,
    pub result: Result<OrderReceipt, BoundaryError>,
}

#[async_trait]
impl OrderSubmitter for SlowSubmitter {
    async fn submit_order(
        &self,
        _order: OrderDraft,
        _address: Address,
        _payment_method: PaymentMethod,
    ) -> Result<OrderReceipt, BoundaryError> {
        sleep(self.delay).await;
        self.result.clone()
    }
}
