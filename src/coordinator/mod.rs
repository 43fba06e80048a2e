//! Mutation Coordinator
//!
//! Owns one cart and applies every change to it. Item mutations are optimistic: the new items and
//! their summary are published immediately, the confirmation boundary is called afterwards, and a
//! failed (or timed out) confirmation puts the mutated item back where it was.
//!
//! All state changes and recomputations happen under a single lock, so two recomputations for the
//! same cart never interleave. Confirmations run outside the lock and may overlap. Every mutation
//! gets a sequence number and the latest one per item is remembered; an outcome for an item that
//! has since been mutated again is discarded as stale.
//!
//! Whatever follows a boundary call runs on its own task, so the cart settles even when the caller
//! stops waiting.

use std::{fmt, future::Future, panic, sync::Arc, time::Duration};

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use tokio::{
    sync::{Mutex, watch},
    time::timeout,
};
use tracing::{Instrument, debug, info, instrument, warn};

use crate::{
    boundary::{
        Ack, BoundaryError, MutationConfirmer, MutationDescriptor, OrderDraft, OrderSubmitter,
        PromoValidator,
    },
    cart::{Cart, CartId, Mutation, MutationError, Placement},
    checkout::{self, Address, OrderReceipt, PaymentMethod},
    errors::{Action, CartError},
    items::{CartItem, ItemId},
    money::Price,
    pricing::{PricingConfig, PricingError, compute_summary, with_delivery_option},
    promo::{PromoCode, PromoRejection, PromoState},
    summary::CartSummary,
};

pub mod view;

pub use view::{CartView, Phase};

/// Coordinator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Longest wait for any boundary call before it counts as failed
    pub boundary_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            boundary_timeout: Duration::from_secs(10),
        }
    }
}

/// The external systems a coordinator talks to.
#[derive(Clone)]
pub struct Boundaries {
    /// Mutation confirmation
    pub confirmer: Arc<dyn MutationConfirmer>,

    /// Promo validation
    pub validator: Arc<dyn PromoValidator>,

    /// Order submission
    pub submitter: Arc<dyn OrderSubmitter>,
}

impl Boundaries {
    /// Uses one backend for all three boundaries.
    pub fn shared<B>(backend: B) -> Self
    where
        B: MutationConfirmer + PromoValidator + OrderSubmitter + 'static,
    {
        let backend = Arc::new(backend);

        Self {
            confirmer: backend.clone(),
            validator: backend.clone(),
            submitter: backend,
        }
    }
}

impl fmt::Debug for Boundaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boundaries").finish_non_exhaustive()
    }
}

/// How a mutation's confirmation ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The boundary confirmed the mutation; the optimistic state stands.
    Confirmed {
        /// Mutation sequence number
        seq: u64,
    },

    /// The same item was mutated again before this one resolved; its outcome was ignored.
    Superseded {
        /// Mutation sequence number
        seq: u64,
    },
}

struct State {
    cart: Cart,
    summary: CartSummary,
    seq: u64,
    /// Latest unresolved mutation per item
    latest: FxHashMap<ItemId, u64>,
    in_flight: usize,
    checking_out: bool,
    revision: u64,
}

impl State {
    fn phase(&self) -> Phase {
        if self.checking_out {
            Phase::CheckingOut
        } else if self.in_flight > 0 {
            Phase::Mutating { seq: self.seq }
        } else {
            Phase::Idle
        }
    }
}

/// Everything the coordinator and its background tasks share.
struct Shared {
    cart_id: CartId,
    state: Mutex<State>,
    published: watch::Sender<Arc<CartView>>,
    boundaries: Boundaries,
    pricing: PricingConfig,
    config: CoordinatorConfig,
}

/// Serialises every change to a single cart.
pub struct CartCoordinator {
    shared: Arc<Shared>,
}

impl fmt::Debug for CartCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartCoordinator")
            .field("cart_id", &self.shared.cart_id)
            .field("pricing", &self.shared.pricing)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl CartCoordinator {
    /// Prices the cart and publishes its first view.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the cart's currency differs from the pricing currency or the
    /// cart cannot be priced.
    pub fn new(
        cart: Cart,
        pricing: PricingConfig,
        config: CoordinatorConfig,
        boundaries: Boundaries,
    ) -> Result<Self, PricingError> {
        if cart.currency() != pricing.currency {
            return Err(PricingError::CurrencyMismatch(
                format!("cart {}", cart.id()),
                cart.currency().iso_alpha_code,
                pricing.currency.iso_alpha_code,
            ));
        }

        let summary = compute_summary(
            cart.items(),
            cart.selected_delivery(),
            cart.promo().applied(),
            &pricing,
        )?;

        let state = State {
            cart,
            summary,
            seq: 0,
            latest: FxHashMap::default(),
            in_flight: 0,
            checking_out: false,
            revision: 0,
        };

        let view = CartView::capture(&state.cart, &state.summary, state.revision, state.phase());
        let (published, _) = watch::channel(Arc::new(view));

        Ok(Self {
            shared: Arc::new(Shared {
                cart_id: state.cart.id(),
                state: Mutex::new(state),
                published,
                boundaries,
                pricing,
                config,
            }),
        })
    }

    /// Cart id
    pub fn cart_id(&self) -> CartId {
        self.shared.cart_id
    }

    /// Pricing constants in use
    pub fn pricing(&self) -> &PricingConfig {
        &self.shared.pricing
    }

    /// The latest published view.
    pub fn view(&self) -> Arc<CartView> {
        self.shared.published.borrow().clone()
    }

    /// Receives every view published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CartView>> {
        self.shared.published.subscribe()
    }

    /// Sets an item's quantity; a quantity below one removes the item.
    ///
    /// # Errors
    ///
    /// See [`CartCoordinator::remove_item`]; also [`CartError::InvalidAmount`] for quantities that
    /// do not fit.
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn change_quantity(
        &self,
        item: ItemId,
        quantity: i64,
    ) -> Result<MutationOutcome, CartError> {
        self.mutate(Mutation::ChangeQuantity { item, quantity }).await
    }

    /// Removes an item.
    ///
    /// # Errors
    ///
    /// - [`CartError::ItemNotFound`]: the item is not in the cart; nothing was published.
    /// - [`CartError::MutationInProgress`]: a checkout is being submitted.
    /// - [`CartError::MutationRejected`]: confirmation failed and the item was put back.
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn remove_item(&self, item: ItemId) -> Result<MutationOutcome, CartError> {
        self.mutate(Mutation::RemoveItem { item }).await
    }

    /// Moves an item to the saved list, keeping its quantity.
    ///
    /// # Errors
    ///
    /// As for [`CartCoordinator::remove_item`], plus [`CartError::DuplicateItem`].
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn save_for_later(&self, item: ItemId) -> Result<MutationOutcome, CartError> {
        self.mutate(Mutation::SaveForLater { item }).await
    }

    /// Moves a saved item into the cart with a quantity of one.
    ///
    /// # Errors
    ///
    /// As for [`CartCoordinator::save_for_later`].
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn move_to_cart(&self, item: ItemId) -> Result<MutationOutcome, CartError> {
        self.mutate(Mutation::MoveToCart { item }).await
    }

    async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome, CartError> {
        let mutation = mutation.normalized();
        let action = Action::from(&mutation);
        let item = mutation.item().clone();

        let (descriptor, placement) = {
            let shared = &*self.shared;
            let mut guard = shared.state.lock().await;
            let state = &mut *guard;

            if state.checking_out {
                return Err(CartError::MutationInProgress { action });
            }

            let next = state
                .cart
                .lists()
                .apply(&mutation)
                .map_err(|error| CartError::from_mutation(&mutation, error))?;

            let placement = state.cart.lists().placement(&item).ok_or_else(|| {
                CartError::from_mutation(&mutation, MutationError::ItemNotFound(item.clone()))
            })?;

            let summary = shared
                .reprice(&state.cart, &next.items)
                .map_err(CartError::pricing(action))?;

            state.seq += 1;
            state.in_flight += 1;
            state.latest.insert(item.clone(), state.seq);
            state.cart.set_lists(next);
            state.summary = summary;

            shared.publish(state);

            debug!(seq = state.seq, %action, %item, "published optimistic mutation");

            (
                MutationDescriptor {
                    seq: state.seq,
                    mutation,
                },
                placement,
            )
        };

        let shared = Arc::clone(&self.shared);

        detach(action, async move {
            shared.confirm(action, descriptor, placement).await
        })
        .await
    }

    /// Selects a delivery option and re-prices the delivery fee.
    ///
    /// # Errors
    ///
    /// [`CartError::UnknownDeliveryOption`] if the option is not offered.
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn select_delivery_option(&self, id: &str) -> Result<Arc<CartView>, CartError> {
        let shared = &*self.shared;
        let mut guard = shared.state.lock().await;
        let state = &mut *guard;

        let option = state
            .cart
            .delivery_options()
            .get(id)
            .cloned()
            .ok_or_else(|| CartError::UnknownDeliveryOption(id.to_string()))?;

        let summary = with_delivery_option(
            &state.summary,
            Some(&option),
            state.cart.promo().applied(),
            &shared.pricing,
        )
        .map_err(CartError::pricing(Action::SelectDeliveryOption))?;

        state.cart.select_delivery(&option);
        state.summary = summary;

        debug!(delivery_option = id, "delivery option selected");

        Ok(shared.publish(state))
    }

    /// Selects the delivery address.
    ///
    /// # Errors
    ///
    /// [`CartError::UnknownAddress`] if the address is unknown.
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn select_address(&self, id: &str) -> Result<Arc<CartView>, CartError> {
        let mut guard = self.shared.state.lock().await;

        if !guard.cart.select_address(id) {
            return Err(CartError::UnknownAddress(id.to_string()));
        }

        Ok(self.shared.publish(&mut guard))
    }

    /// Selects the payment method.
    ///
    /// # Errors
    ///
    /// [`CartError::UnknownPaymentMethod`] if the method is unknown.
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn select_payment_method(&self, id: &str) -> Result<Arc<CartView>, CartError> {
        let mut guard = self.shared.state.lock().await;

        if !guard.cart.select_payment(id) {
            return Err(CartError::UnknownPaymentMethod(id.to_string()));
        }

        Ok(self.shared.publish(&mut guard))
    }

    /// Records promo input as the user types it.
    ///
    /// # Errors
    ///
    /// [`CartError::PromoAlreadyApplied`] while a code is applied, or
    /// [`CartError::MutationInProgress`] while one is being validated.
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn enter_promo(&self, input: &str) -> Result<Arc<CartView>, CartError> {
        let mut guard = self.shared.state.lock().await;

        guard
            .cart
            .promo_mut()
            .enter(input)
            .map_err(|error| CartError::from_promo_flow(Action::EnterPromo, error))?;

        Ok(self.shared.publish(&mut guard))
    }

    /// Validates and applies a promo code.
    ///
    /// # Errors
    ///
    /// - [`CartError::EmptyCode`]: blank input; no validation call is made.
    /// - [`CartError::PromoAlreadyApplied`] / [`CartError::MutationInProgress`]: see
    ///   [`CartCoordinator::enter_promo`].
    /// - [`CartError::InvalidPromoCode`]: the code was refused; the input returns to editing.
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn apply_promo(&self, code: &str) -> Result<Arc<CartView>, CartError> {
        let (code, subtotal) = {
            let mut guard = self.shared.state.lock().await;
            let state = &mut *guard;

            let code = state
                .cart
                .promo_mut()
                .begin_validation(code)
                .map_err(|error| CartError::from_promo_flow(Action::ApplyPromo, error))?;

            self.shared.publish(state);

            (code, state.summary.subtotal)
        };

        debug!(%code, "validating promo code");

        let shared = Arc::clone(&self.shared);

        detach(Action::ApplyPromo, async move {
            shared.validate(code, subtotal).await
        })
        .await
    }

    /// Removes any entered or applied promo code and re-prices without it.
    ///
    /// # Errors
    ///
    /// [`CartError::MutationInProgress`] while a code is being validated.
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn remove_promo(&self) -> Result<Arc<CartView>, CartError> {
        let shared = &*self.shared;
        let mut guard = shared.state.lock().await;
        let state = &mut *guard;

        let summary = compute_summary(
            state.cart.items(),
            state.cart.selected_delivery(),
            None,
            &shared.pricing,
        )
        .map_err(CartError::pricing(Action::RemovePromo))?;

        let removed = state
            .cart
            .promo_mut()
            .remove()
            .map_err(|error| CartError::from_promo_flow(Action::RemovePromo, error))?;

        state.summary = summary;

        if let Some(promo) = removed {
            info!(code = promo.code(), "promo code removed");
        }

        Ok(shared.publish(state))
    }

    /// Submits the order once every precondition holds.
    ///
    /// On success the cart's items are cleared and the summary reset; on failure nothing changes.
    ///
    /// # Errors
    ///
    /// - [`CartError::EmptyCart`], [`CartError::NoDeliveryAddress`],
    ///   [`CartError::NoPaymentMethod`]: checked in that order, before any network call.
    /// - [`CartError::MutationInProgress`]: a confirmation, promo validation or checkout is
    ///   outstanding.
    /// - [`CartError::CheckoutFailed`]: the submission failed; the cart is untouched.
    #[instrument(skip(self), fields(cart = %self.shared.cart_id))]
    pub async fn checkout(&self) -> Result<OrderReceipt, CartError> {
        let (draft, address, payment) = {
            let shared = &*self.shared;
            let mut guard = shared.state.lock().await;
            let state = &mut *guard;

            let (address, payment) = checkout::guard(
                state.cart.items(),
                state.cart.selected_address(),
                state.cart.selected_payment(),
            )
            .map(|(address, payment)| (address.clone(), payment.clone()))?;

            if state.checking_out || state.in_flight > 0 || state.cart.promo().is_validating() {
                return Err(CartError::MutationInProgress {
                    action: Action::Checkout,
                });
            }

            let draft = OrderDraft {
                cart: shared.cart_id,
                items: state.cart.items().to_vec(),
                summary: state.summary.clone(),
                delivery_option: state
                    .cart
                    .selected_delivery()
                    .map(|option| option.id.clone()),
            };

            state.checking_out = true;
            shared.publish(state);

            (draft, address, payment)
        };

        info!(total = %draft.summary.total, "submitting order");

        let shared = Arc::clone(&self.shared);

        detach(Action::Checkout, async move {
            shared.submit(draft, address, payment).await
        })
        .await
    }
}

impl Shared {
    /// Confirms a published mutation and settles its outcome.
    async fn confirm(
        &self,
        action: Action,
        descriptor: MutationDescriptor,
        placement: Placement,
    ) -> Result<MutationOutcome, CartError> {
        let seq = descriptor.seq;
        let item = descriptor.mutation.item().clone();

        let result = self
            .bounded(
                self.boundaries
                    .confirmer
                    .confirm_mutation(self.cart_id, descriptor),
                BoundaryError::TimedOut,
            )
            .await;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.in_flight = state.in_flight.saturating_sub(1);

        if state.latest.get(&item) != Some(&seq) {
            debug!(seq, %item, ok = result.is_ok(), "discarding stale confirmation");
            self.settle(state);

            return Ok(MutationOutcome::Superseded { seq });
        }

        state.latest.remove(&item);

        let source = match result {
            Ok(Ack) => {
                self.settle(state);
                info!(seq, %action, %item, "mutation confirmed");

                return Ok(MutationOutcome::Confirmed { seq });
            }
            Err(source) => source,
        };

        let restored = state.cart.lists().restore(&placement);

        let summary = match self.reprice(&state.cart, &restored.items) {
            Ok(summary) => summary,
            Err(error) => {
                self.settle(state);
                return Err(CartError::pricing(action)(error));
            }
        };

        state.cart.set_lists(restored);
        state.summary = summary;

        self.publish(state);

        warn!(seq, %action, %item, error = %source, "mutation rejected, rolled back");

        Err(CartError::MutationRejected {
            action,
            item,
            seq,
            source,
        })
    }

    /// Validates a submitted promo code and applies or rejects it.
    async fn validate(&self, code: String, subtotal: Price) -> Result<Arc<CartView>, CartError> {
        let result = self
            .bounded(
                self.boundaries
                    .validator
                    .validate_promo(code.clone(), subtotal),
                |limit| PromoRejection::Unavailable(format!("no response within {limit:?}")),
            )
            .await
            .and_then(|promo| self.vet_promo(promo));

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let promo = match result {
            Ok(promo) => promo,
            Err(reason) => {
                state.cart.promo_mut().reject();
                self.publish(state);

                warn!(%code, %reason, "promo code rejected");

                return Err(CartError::InvalidPromoCode { code, reason });
            }
        };

        let summary = compute_summary(
            state.cart.items(),
            state.cart.selected_delivery(),
            Some(&promo),
            &self.pricing,
        );

        match summary {
            Ok(summary) => {
                state.cart.promo_mut().accept(promo);
                state.summary = summary;

                info!(%code, "promo code applied");

                Ok(self.publish(state))
            }
            Err(source) => {
                state.cart.promo_mut().reject();
                self.publish(state);

                Err(CartError::Pricing {
                    action: Action::ApplyPromo,
                    source,
                })
            }
        }
    }

    /// Submits the order and clears the cart once it is placed.
    async fn submit(
        &self,
        draft: OrderDraft,
        address: Address,
        payment: PaymentMethod,
    ) -> Result<OrderReceipt, CartError> {
        let result = self
            .bounded(
                self.boundaries
                    .submitter
                    .submit_order(draft, address, payment),
                BoundaryError::TimedOut,
            )
            .await;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.checking_out = false;

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(source) => {
                self.publish(state);

                warn!(error = %source, "order submission failed");

                return Err(CartError::CheckoutFailed(source));
            }
        };

        let summary = compute_summary(&[], state.cart.selected_delivery(), None, &self.pricing)
            .map_err(CartError::pricing(Action::Checkout));

        let summary = match summary {
            Ok(summary) => summary,
            Err(error) => {
                self.publish(state);
                return Err(error);
            }
        };

        let mut lists = state.cart.lists().clone();
        lists.items.clear();

        state.cart.set_lists(lists);
        *state.cart.promo_mut() = PromoState::Empty;
        state.summary = summary;
        state.seq += 1;

        self.publish(state);

        info!(order_id = %receipt.order_id, "order placed");

        Ok(receipt)
    }

    fn reprice(&self, cart: &Cart, items: &[CartItem]) -> Result<CartSummary, PricingError> {
        compute_summary(
            items,
            cart.selected_delivery(),
            cart.promo().applied(),
            &self.pricing,
        )
    }

    /// Checks a validated promo against what the engine can apply.
    fn vet_promo(&self, promo: PromoCode) -> Result<PromoCode, PromoRejection> {
        if promo.is_expired_at(Timestamp::now()) {
            return Err(PromoRejection::Expired);
        }

        if promo.currency() != self.pricing.currency {
            return Err(PromoRejection::Other(format!(
                "promo currency {} does not match cart currency {}",
                promo.currency().iso_alpha_code,
                self.pricing.currency.iso_alpha_code
            )));
        }

        Ok(promo)
    }

    async fn bounded<T, E>(
        &self,
        call: impl Future<Output = Result<T, E>>,
        on_timeout: impl FnOnce(Duration) -> E,
    ) -> Result<T, E> {
        let limit = self.config.boundary_timeout;

        timeout(limit, call)
            .await
            .unwrap_or_else(|_elapsed| Err(on_timeout(limit)))
    }

    fn publish(&self, state: &mut State) -> Arc<CartView> {
        state.revision += 1;

        let view = Arc::new(CartView::capture(
            &state.cart,
            &state.summary,
            state.revision,
            state.phase(),
        ));

        self.published.send_replace(view.clone());

        view
    }

    /// Republishes only if the phase changed since the last publish.
    fn settle(&self, state: &mut State) {
        if self.published.borrow().phase != state.phase() {
            self.publish(state);
        }
    }
}

/// Runs the rest of an operation on its own task, so the cart settles even if the caller drops
/// the returned future.
async fn detach<T>(
    action: Action,
    task: impl Future<Output = Result<T, CartError>> + Send + 'static,
) -> Result<T, CartError>
where
    T: Send + 'static,
{
    match tokio::spawn(task.in_current_span()).await {
        Ok(result) => result,
        Err(error) => match error.try_into_panic() {
            Ok(payload) => panic::resume_unwind(payload),
            Err(source) => Err(CartError::Interrupted { action, source }),
        },
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use super::*;
    use crate::{
        boundary::{MockMutationConfirmer, MockOrderSubmitter, MockPromoValidator},
        checkout::{Address, PaymentMethod},
        delivery::{DeliveryOption, DeliveryOptions},
        money::{DiscountPercent, Quantity},
        promo::PromoDiscount,
    };

    fn usd(minor: i64) -> crate::money::Price {
        Money::from_minor(minor, USD)
    }

    fn cart() -> TestResult<Cart> {
        let item = CartItem::new("pad-thai", "Pad Thai", usd(10_00))?
            .with_quantity(Quantity::new(2)?)
            .with_discount(DiscountPercent::new(rust_decimal::Decimal::TEN)?);

        Ok(Cart::new(CartId::generate(), USD)
            .with_items([item], Vec::<crate::items::SavedItem>::new())?
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

    fn coordinator(
        confirmer: MockMutationConfirmer,
        validator: MockPromoValidator,
        submitter: MockOrderSubmitter,
    ) -> TestResult<CartCoordinator> {
        Ok(CartCoordinator::new(
            cart()?,
            PricingConfig::default(),
            CoordinatorConfig::default(),
            Boundaries {
                confirmer: Arc::new(confirmer),
                validator: Arc::new(validator),
                submitter: Arc::new(submitter),
            },
        )?)
    }

    #[tokio::test]
    async fn initial_view_is_priced() -> TestResult {
        let coordinator = coordinator(
            MockMutationConfirmer::new(),
            MockPromoValidator::new(),
            MockOrderSubmitter::new(),
        )?;

        let view = coordinator.view();

        assert_eq!(view.summary.total, usd(25_42));
        assert_eq!(view.delivery_option.as_deref(), Some("standard"));
        assert!(view.is_idle());

        Ok(())
    }

    #[tokio::test]
    async fn unknown_item_fails_before_any_confirmation() -> TestResult {
        let mut confirmer = MockMutationConfirmer::new();
        confirmer.expect_confirm_mutation().times(0);

        let coordinator = coordinator(confirmer, MockPromoValidator::new(), MockOrderSubmitter::new())?;
        let before = coordinator.view();

        let result = coordinator.remove_item("missing".into()).await;

        assert!(matches!(result, Err(CartError::ItemNotFound { .. })));
        assert_eq!(coordinator.view(), before);

        Ok(())
    }

    #[tokio::test]
    async fn confirmed_mutation_keeps_optimistic_state() -> TestResult {
        let mut confirmer = MockMutationConfirmer::new();
        confirmer
            .expect_confirm_mutation()
            .withf(|_, descriptor| {
                descriptor.seq == 1
                    && descriptor.mutation
                        == Mutation::ChangeQuantity {
                            item: "pad-thai".into(),
                            quantity: 3,
                        }
            })
            .times(1)
            .returning(|_, _| Ok(Ack));

        let coordinator = coordinator(confirmer, MockPromoValidator::new(), MockOrderSubmitter::new())?;

        let outcome = coordinator.change_quantity("pad-thai".into(), 3).await?;

        assert_eq!(outcome, MutationOutcome::Confirmed { seq: 1 });

        let view = coordinator.view();
        assert_eq!(view.items.first().map(|i| i.quantity().get()), Some(3));
        assert_eq!(view.summary.subtotal, usd(30_00));
        assert!(view.is_idle());

        Ok(())
    }

    #[tokio::test]
    async fn zero_quantity_is_confirmed_as_removal() -> TestResult {
        let mut confirmer = MockMutationConfirmer::new();
        confirmer
            .expect_confirm_mutation()
            .withf(|_, descriptor| {
                descriptor.mutation
                    == Mutation::RemoveItem {
                        item: "pad-thai".into(),
                    }
            })
            .times(1)
            .returning(|_, _| Ok(Ack));

        let coordinator = coordinator(confirmer, MockPromoValidator::new(), MockOrderSubmitter::new())?;

        coordinator.change_quantity("pad-thai".into(), 0).await?;

        assert!(coordinator.view().items.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn rejected_mutation_rolls_back() -> TestResult {
        let mut confirmer = MockMutationConfirmer::new();
        confirmer
            .expect_confirm_mutation()
            .returning(|_, _| Err(BoundaryError::Rejected("out of stock".to_string())));

        let coordinator = coordinator(confirmer, MockPromoValidator::new(), MockOrderSubmitter::new())?;
        let before = coordinator.view();

        let result = coordinator.save_for_later("pad-thai".into()).await;

        assert!(matches!(
            result,
            Err(CartError::MutationRejected {
                action: Action::SaveForLater,
                seq: 1,
                ..
            })
        ));

        let after = coordinator.view();
        assert_eq!(after.priced(), before.priced());
        assert!(after.is_idle());

        Ok(())
    }

    #[tokio::test]
    async fn delivery_selection_matches_full_recompute() -> TestResult {
        let coordinator = coordinator(
            MockMutationConfirmer::new(),
            MockPromoValidator::new(),
            MockOrderSubmitter::new(),
        )?;

        let view = coordinator.select_delivery_option("express").await?;

        let express = DeliveryOption::new("express", "Express", usd(7_99))?;
        let expected = compute_summary(&view.items, Some(&express), None, coordinator.pricing())?;

        assert_eq!(view.summary, expected);
        assert_eq!(view.delivery_option.as_deref(), Some("express"));

        Ok(())
    }

    #[tokio::test]
    async fn unknown_delivery_option_is_rejected() -> TestResult {
        let coordinator = coordinator(
            MockMutationConfirmer::new(),
            MockPromoValidator::new(),
            MockOrderSubmitter::new(),
        )?;

        let result = coordinator.select_delivery_option("drone").await;

        assert!(matches!(result, Err(CartError::UnknownDeliveryOption(id)) if id == "drone"));

        Ok(())
    }

    #[tokio::test]
    async fn blank_promo_never_reaches_validator() -> TestResult {
        let mut validator = MockPromoValidator::new();
        validator.expect_validate_promo().times(0);

        let coordinator = coordinator(MockMutationConfirmer::new(), validator, MockOrderSubmitter::new())?;

        let result = coordinator.apply_promo("   ").await;

        assert!(matches!(result, Err(CartError::EmptyCode)));

        Ok(())
    }

    #[tokio::test]
    async fn applied_promo_reprices_and_blocks_second_code() -> TestResult {
        let mut validator = MockPromoValidator::new();
        validator
            .expect_validate_promo()
            .withf(|code, subtotal| code == "SAVE5" && *subtotal == usd(20_00))
            .times(1)
            .returning(|code, _| {
                PromoCode::new(&code, PromoDiscount::Fixed(usd(5_00)), usd(15_00))
                    .map_err(|error| PromoRejection::Other(error.to_string()))
            });

        let coordinator = coordinator(MockMutationConfirmer::new(), validator, MockOrderSubmitter::new())?;

        let view = coordinator.apply_promo("save5").await?;

        assert_eq!(view.summary.total, usd(20_42));
        assert!(view.summary.promo_applied);

        let second = coordinator.apply_promo("OTHER").await;
        assert!(matches!(second, Err(CartError::PromoAlreadyApplied(code)) if code == "SAVE5"));

        Ok(())
    }

    #[tokio::test]
    async fn rejected_promo_returns_to_entering() -> TestResult {
        let mut validator = MockPromoValidator::new();
        validator
            .expect_validate_promo()
            .returning(|_, _| Err(PromoRejection::NotFound));

        let coordinator = coordinator(MockMutationConfirmer::new(), validator, MockOrderSubmitter::new())?;
        let before = coordinator.view();

        let result = coordinator.apply_promo("nope").await;

        assert!(matches!(
            result,
            Err(CartError::InvalidPromoCode {
                reason: PromoRejection::NotFound,
                ..
            })
        ));

        let view = coordinator.view();
        assert_eq!(
            view.promo,
            PromoState::Entering {
                input: "NOPE".to_string()
            }
        );
        assert_eq!(view.summary, before.summary);

        Ok(())
    }

    #[tokio::test]
    async fn expired_promo_is_rejected_locally() -> TestResult {
        let mut validator = MockPromoValidator::new();
        validator.expect_validate_promo().returning(|code, _| {
            PromoCode::new(&code, PromoDiscount::Shipping, usd(0))
                .map(|promo| promo.with_expiry(Timestamp::UNIX_EPOCH))
                .map_err(|error| PromoRejection::Other(error.to_string()))
        });

        let coordinator = coordinator(MockMutationConfirmer::new(), validator, MockOrderSubmitter::new())?;

        let result = coordinator.apply_promo("OLDSHIP").await;

        assert!(matches!(
            result,
            Err(CartError::InvalidPromoCode {
                reason: PromoRejection::Expired,
                ..
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn checkout_guards_run_in_priority_order() -> TestResult {
        let mut submitter = MockOrderSubmitter::new();
        submitter.expect_submit_order().times(0);

        let empty = Cart::new(CartId::generate(), USD);
        let coordinator = CartCoordinator::new(
            empty,
            PricingConfig::default(),
            CoordinatorConfig::default(),
            Boundaries {
                confirmer: Arc::new(MockMutationConfirmer::new()),
                validator: Arc::new(MockPromoValidator::new()),
                submitter: Arc::new(submitter),
            },
        )?;

        assert!(matches!(coordinator.checkout().await, Err(CartError::EmptyCart)));

        Ok(())
    }

    #[tokio::test]
    async fn successful_checkout_clears_items() -> TestResult {
        let mut submitter = MockOrderSubmitter::new();
        submitter
            .expect_submit_order()
            .withf(|draft, address, payment| {
                draft.items.len() == 1 && address.id == "home" && payment.id == "visa"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(OrderReceipt {
                    order_id: "order-1".to_string(),
                })
            });

        let coordinator = coordinator(MockMutationConfirmer::new(), MockPromoValidator::new(), submitter)?;

        let receipt = coordinator.checkout().await?;

        assert_eq!(receipt.order_id, "order-1");

        let view = coordinator.view();
        assert!(view.items.is_empty());
        assert_eq!(
            view.summary,
            compute_summary(
                &[],
                Some(&DeliveryOption::new("standard", "Standard", usd(3_99))?.default_option()),
                None,
                coordinator.pricing()
            )?
        );

        Ok(())
    }

    #[tokio::test]
    async fn failed_checkout_leaves_cart_untouched() -> TestResult {
        let mut submitter = MockOrderSubmitter::new();
        submitter
            .expect_submit_order()
            .returning(|_, _, _| Err(BoundaryError::Unavailable("payment gateway down".to_string())));

        let coordinator = coordinator(MockMutationConfirmer::new(), MockPromoValidator::new(), submitter)?;
        let before = coordinator.view();

        let result = coordinator.checkout().await;

        assert!(matches!(result, Err(CartError::CheckoutFailed(BoundaryError::Unavailable(_)))));

        let after = coordinator.view();
        assert_eq!(after.priced(), before.priced());
        assert!(after.is_idle());

        Ok(())
    }
}
