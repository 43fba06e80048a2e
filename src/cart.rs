//! Cart
//!
//! The cart entity graph plus the pure item-level transforms applied by the mutation coordinator.

use std::fmt;

use rusty_money::iso::Currency;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    checkout::{Address, PaymentMethod, default_id},
    delivery::{DeliveryError, DeliveryOptions},
    items::{CartItem, ItemId, SavedItem},
    money::{AmountError, Quantity},
    promo::PromoState,
};

/// Errors related to cart construction.
#[derive(Debug, Error, PartialEq)]
pub enum CartBuildError {
    /// An item's currency differs from the cart currency (item id, item currency, cart currency).
    #[error("Item {0} has currency {1}, but cart has currency {2}")]
    CurrencyMismatch(ItemId, &'static str, &'static str),

    /// The same item id appears twice across the cart and saved lists.
    #[error("duplicate item id: {0}")]
    DuplicateItem(ItemId),

    /// Invalid delivery option set.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Errors raised by the pure item transforms.
#[derive(Debug, Error, PartialEq)]
pub enum MutationError {
    /// No cart item has this id.
    #[error("item {0} is not in the cart")]
    ItemNotFound(ItemId),

    /// No saved item has this id.
    #[error("item {0} is not in the saved list")]
    SavedItemNotFound(ItemId),

    /// The cart already holds an item with this id.
    #[error("item {0} is already in the cart")]
    AlreadyInCart(ItemId),

    /// The saved list already holds an item with this id.
    #[error("item {0} is already saved")]
    AlreadySaved(ItemId),

    /// Invalid quantity.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Cart identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CartId(Uuid);

impl CartId {
    /// A fresh, time-ordered id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing uuid.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying uuid.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An item-level change requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Set an item's quantity; anything below 1 removes the item.
    ChangeQuantity {
        /// Target item
        item: ItemId,
        /// Requested quantity
        quantity: i64,
    },

    /// Remove an item from the cart.
    RemoveItem {
        /// Target item
        item: ItemId,
    },

    /// Move an item from the cart to the saved list, keeping its quantity.
    SaveForLater {
        /// Target item
        item: ItemId,
    },

    /// Move a saved item into the cart with a quantity of one.
    MoveToCart {
        /// Target item
        item: ItemId,
    },
}

impl Mutation {
    /// The item this mutation targets.
    pub fn item(&self) -> &ItemId {
        match self {
            Mutation::ChangeQuantity { item, .. }
            | Mutation::RemoveItem { item }
            | Mutation::SaveForLater { item }
            | Mutation::MoveToCart { item } => item,
        }
    }

    /// Rewrites a quantity change below one into the removal it stands for.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Mutation::ChangeQuantity { item, quantity } if quantity < 1 => {
                Mutation::RemoveItem { item }
            }
            other => other,
        }
    }
}

/// The priced items and the saved-for-later items; the unit a mutation snapshots and restores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemLists {
    /// Items in the priced cart
    pub items: Vec<CartItem>,

    /// Items saved for later
    pub saved: Vec<SavedItem>,
}

/// Which of the two lists an item sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// The priced cart
    Items,

    /// Saved for later
    Saved,
}

/// An item together with its position, captured before a mutation touches it.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// The item as it was
    pub item: CartItem,

    /// The list it was in
    pub list: ListKind,

    /// Its index in that list
    pub index: usize,
}

impl ItemLists {
    /// Applies a mutation to a copy of the lists.
    ///
    /// # Errors
    ///
    /// Returns a [`MutationError`] if the target item is missing, would be duplicated, or the
    /// quantity is out of range.
    pub fn apply(&self, mutation: &Mutation) -> Result<ItemLists, MutationError> {
        let mut next = self.clone();

        match mutation {
            Mutation::ChangeQuantity { item, quantity } if *quantity < 1 => {
                next.take_item(item)?;
            }
            Mutation::ChangeQuantity { item, quantity } => {
                let quantity = Quantity::new(*quantity)?;

                next.items
                    .iter_mut()
                    .find(|entry| entry.id() == item)
                    .ok_or_else(|| MutationError::ItemNotFound(item.clone()))?
                    .set_quantity(quantity);
            }
            Mutation::RemoveItem { item } => {
                next.take_item(item)?;
            }
            Mutation::SaveForLater { item } => {
                if next.saved.iter().any(|entry| entry.id() == item) {
                    return Err(MutationError::AlreadySaved(item.clone()));
                }

                let moved = next.take_item(item)?;
                next.saved.push(moved);
            }
            Mutation::MoveToCart { item } => {
                if next.items.iter().any(|entry| entry.id() == item) {
                    return Err(MutationError::AlreadyInCart(item.clone()));
                }

                let idx = next
                    .saved
                    .iter()
                    .position(|entry| entry.id() == item)
                    .ok_or_else(|| MutationError::SavedItemNotFound(item.clone()))?;

                let mut moved = next.saved.remove(idx);
                moved.set_quantity(Quantity::ONE);
                next.items.push(moved);
            }
        }

        Ok(next)
    }

    /// Where an item currently sits, if it is in either list.
    pub fn placement(&self, id: &ItemId) -> Option<Placement> {
        let find = |list: &[CartItem], kind: ListKind| {
            list.iter()
                .enumerate()
                .find(|(_, entry)| entry.id() == id)
                .map(|(index, item)| Placement {
                    item: item.clone(),
                    list: kind,
                    index,
                })
        };

        find(&self.items, ListKind::Items).or_else(|| find(&self.saved, ListKind::Saved))
    }

    /// Puts one item back where `placement` recorded it. Every other item is left as it is.
    #[must_use]
    pub fn restore(&self, placement: &Placement) -> ItemLists {
        let mut next = self.clone();
        let id = placement.item.id();

        next.items.retain(|entry| entry.id() != id);
        next.saved.retain(|entry| entry.id() != id);

        let list = match placement.list {
            ListKind::Items => &mut next.items,
            ListKind::Saved => &mut next.saved,
        };
        let index = placement.index.min(list.len());
        list.insert(index, placement.item.clone());

        next
    }

    fn take_item(&mut self, item: &ItemId) -> Result<CartItem, MutationError> {
        let idx = self
            .items
            .iter()
            .position(|entry| entry.id() == item)
            .ok_or_else(|| MutationError::ItemNotFound(item.clone()))?;

        Ok(self.items.remove(idx))
    }
}

/// A shopping cart and everything selected against it.
#[derive(Debug, Clone)]
pub struct Cart {
    id: CartId,
    currency: &'static Currency,
    lists: ItemLists,
    delivery_options: DeliveryOptions,
    selected_delivery: Option<String>,
    addresses: Vec<Address>,
    selected_address: Option<String>,
    payment_methods: Vec<PaymentMethod>,
    selected_payment: Option<String>,
    promo: PromoState,
}

impl Cart {
    /// Create an empty cart.
    pub fn new(id: CartId, currency: &'static Currency) -> Self {
        Self {
            id,
            currency,
            lists: ItemLists::default(),
            delivery_options: DeliveryOptions::default(),
            selected_delivery: None,
            addresses: Vec::new(),
            selected_address: None,
            payment_methods: Vec::new(),
            selected_payment: None,
            promo: PromoState::Empty,
        }
    }

    /// Sets the priced and saved items.
    ///
    /// # Errors
    ///
    /// Returns a [`CartBuildError`] on currency mismatches or duplicate ids.
    pub fn with_items(
        mut self,
        items: impl Into<Vec<CartItem>>,
        saved: impl Into<Vec<SavedItem>>,
    ) -> Result<Self, CartBuildError> {
        let lists = ItemLists {
            items: items.into(),
            saved: saved.into(),
        };

        let all: Vec<&CartItem> = lists.items.iter().chain(lists.saved.iter()).collect();

        for (idx, item) in all.iter().enumerate() {
            let item_currency = item.base_price().currency();
            if item_currency != self.currency {
                return Err(CartBuildError::CurrencyMismatch(
                    item.id().clone(),
                    item_currency.iso_alpha_code,
                    self.currency.iso_alpha_code,
                ));
            }

            if all.iter().skip(idx + 1).any(|other| other.id() == item.id()) {
                return Err(CartBuildError::DuplicateItem(item.id().clone()));
            }
        }

        self.lists = lists;

        Ok(self)
    }

    /// Sets the delivery options and selects the initial one.
    #[must_use]
    pub fn with_delivery_options(mut self, options: DeliveryOptions) -> Self {
        self.selected_delivery = options.initial_selection().map(|option| option.id.clone());
        self.delivery_options = options;
        self
    }

    /// Sets the saved addresses, preselecting the flagged default.
    #[must_use]
    pub fn with_addresses(mut self, addresses: Vec<Address>) -> Self {
        self.selected_address = default_id(&addresses, |a| a.is_default, |a| a.id.as_str());
        self.addresses = addresses;
        self
    }

    /// Sets the stored payment methods, preselecting the flagged default.
    #[must_use]
    pub fn with_payment_methods(mut self, methods: Vec<PaymentMethod>) -> Self {
        self.selected_payment = default_id(&methods, |m| m.is_default, |m| m.id.as_str());
        self.payment_methods = methods;
        self
    }

    /// Sets the promo state, e.g. an already-applied code from the server.
    #[must_use]
    pub fn with_promo(mut self, promo: PromoState) -> Self {
        self.promo = promo;
        self
    }

    /// Cart id
    pub fn id(&self) -> CartId {
        self.id
    }

    /// Cart currency
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Items in the priced cart
    pub fn items(&self) -> &[CartItem] {
        &self.lists.items
    }

    /// Items saved for later
    pub fn saved(&self) -> &[SavedItem] {
        &self.lists.saved
    }

    /// Both item lists
    pub fn lists(&self) -> &ItemLists {
        &self.lists
    }

    pub(crate) fn set_lists(&mut self, lists: ItemLists) {
        self.lists = lists;
    }

    /// Offered delivery options
    pub fn delivery_options(&self) -> &DeliveryOptions {
        &self.delivery_options
    }

    /// The selected delivery option, if any.
    pub fn selected_delivery(&self) -> Option<&crate::delivery::DeliveryOption> {
        self.selected_delivery
            .as_deref()
            .and_then(|id| self.delivery_options.get(id))
    }

    /// Selects one of the offered delivery options.
    pub(crate) fn select_delivery(&mut self, option: &crate::delivery::DeliveryOption) {
        self.selected_delivery = Some(option.id.clone());
    }

    /// Saved addresses
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// The selected delivery address, if any.
    pub fn selected_address(&self) -> Option<&Address> {
        let id = self.selected_address.as_deref()?;
        self.addresses.iter().find(|address| address.id == id)
    }

    /// Selects an address by id; returns `false` if it is unknown.
    pub(crate) fn select_address(&mut self, id: &str) -> bool {
        let known = self.addresses.iter().any(|address| address.id == id);
        if known {
            self.selected_address = Some(id.to_string());
        }
        known
    }

    /// Stored payment methods
    pub fn payment_methods(&self) -> &[PaymentMethod] {
        &self.payment_methods
    }

    /// The selected payment method, if any.
    pub fn selected_payment(&self) -> Option<&PaymentMethod> {
        let id = self.selected_payment.as_deref()?;
        self.payment_methods.iter().find(|method| method.id == id)
    }

    /// Selects a payment method by id; returns `false` if it is unknown.
    pub(crate) fn select_payment(&mut self, id: &str) -> bool {
        let known = self.payment_methods.iter().any(|method| method.id == id);
        if known {
            self.selected_payment = Some(id.to_string());
        }
        known
    }

    /// Promo entry state
    pub fn promo(&self) -> &PromoState {
        &self.promo
    }

    pub(crate) fn promo_mut(&mut self) -> &mut PromoState {
        &mut self.promo
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{
        Money,
        iso::{GBP, USD},
    };
    use testresult::TestResult;

    use super::*;
    use crate::delivery::DeliveryOption;

    fn item(id: &str, quantity: i64) -> TestResult<CartItem> {
        Ok(CartItem::new(id, id, Money::from_minor(5_00, USD))?.with_quantity(Quantity::new(quantity)?))
    }

    fn lists() -> TestResult<ItemLists> {
        Ok(ItemLists {
            items: vec![item("a", 2)?, item("b", 1)?],
            saved: vec![item("c", 4)?],
        })
    }

    #[test]
    fn change_quantity_sets_quantity() -> TestResult {
        let next = lists()?.apply(&Mutation::ChangeQuantity {
            item: "a".into(),
            quantity: 5,
        })?;

        assert_eq!(next.items.first().map(|i| i.quantity().get()), Some(5));

        Ok(())
    }

    #[test]
    fn change_quantity_to_zero_is_removal() -> TestResult {
        let lists = lists()?;

        let changed = lists.apply(&Mutation::ChangeQuantity {
            item: "a".into(),
            quantity: 0,
        })?;
        let removed = lists.apply(&Mutation::RemoveItem { item: "a".into() })?;

        assert_eq!(changed, removed);
        assert!(changed.items.iter().all(|i| i.id().as_str() != "a"));

        Ok(())
    }

    #[test]
    fn normalized_rewrites_non_positive_quantity() {
        let mutation = Mutation::ChangeQuantity {
            item: "a".into(),
            quantity: -3,
        };

        assert_eq!(
            mutation.normalized(),
            Mutation::RemoveItem { item: "a".into() }
        );
    }

    #[test]
    fn save_for_later_preserves_quantity() -> TestResult {
        let next = lists()?.apply(&Mutation::SaveForLater { item: "a".into() })?;

        assert_eq!(next.items.len(), 1);
        let saved = next.saved.iter().find(|i| i.id().as_str() == "a");
        assert_eq!(saved.map(|i| i.quantity().get()), Some(2));

        Ok(())
    }

    #[test]
    fn move_to_cart_resets_quantity() -> TestResult {
        let next = lists()?.apply(&Mutation::MoveToCart { item: "c".into() })?;

        assert!(next.saved.is_empty());
        let moved = next.items.iter().find(|i| i.id().as_str() == "c");
        assert_eq!(moved.map(|i| i.quantity().get()), Some(1));

        Ok(())
    }

    #[test]
    fn missing_items_are_reported() -> TestResult {
        let lists = lists()?;

        assert_eq!(
            lists.apply(&Mutation::RemoveItem { item: "zzz".into() }),
            Err(MutationError::ItemNotFound("zzz".into()))
        );
        assert_eq!(
            lists.apply(&Mutation::MoveToCart { item: "a".into() }),
            Err(MutationError::SavedItemNotFound("a".into()))
        );

        Ok(())
    }

    #[test]
    fn apply_leaves_original_untouched() -> TestResult {
        let lists = lists()?;
        let before = lists.clone();

        lists.apply(&Mutation::SaveForLater { item: "b".into() })?;

        assert_eq!(lists, before);

        Ok(())
    }

    #[test]
    fn restore_undoes_one_item_and_keeps_the_rest() -> TestResult {
        let lists = lists()?;
        let placement = lists.placement(&"c".into()).ok_or("c is saved")?;

        let moved = lists.apply(&Mutation::MoveToCart { item: "c".into() })?;
        let changed = moved.apply(&Mutation::ChangeQuantity {
            item: "b".into(),
            quantity: 7,
        })?;

        let restored = changed.restore(&placement);

        assert_eq!(restored.saved, lists.saved);
        assert_eq!(
            restored
                .items
                .iter()
                .map(|i| (i.id().as_str(), i.quantity().get()))
                .collect::<Vec<_>>(),
            vec![("a", 2), ("b", 7)]
        );

        Ok(())
    }

    #[test]
    fn restore_returns_removed_item_to_its_position() -> TestResult {
        let lists = lists()?;
        let placement = lists.placement(&"a".into()).ok_or("a is in the cart")?;

        let removed = lists.apply(&Mutation::RemoveItem { item: "a".into() })?;

        assert_eq!(placement.list, ListKind::Items);
        assert_eq!(removed.restore(&placement), lists);

        Ok(())
    }

    #[test]
    fn with_items_rejects_currency_mismatch() -> TestResult {
        let gbp = CartItem::new("x", "X", Money::from_minor(1_00, GBP))?;

        let result = Cart::new(CartId::generate(), USD).with_items([gbp], Vec::<SavedItem>::new());

        assert!(matches!(
            result,
            Err(CartBuildError::CurrencyMismatch(id, "GBP", "USD")) if id.as_str() == "x"
        ));

        Ok(())
    }

    #[test]
    fn with_items_rejects_duplicates_across_lists() -> TestResult {
        let result = Cart::new(CartId::generate(), USD).with_items([item("a", 1)?], [item("a", 1)?]);

        assert_eq!(result.err(), Some(CartBuildError::DuplicateItem("a".into())));

        Ok(())
    }

    #[test]
    fn delivery_selection_defaults_and_validates() -> TestResult {
        let express = DeliveryOption::new("express", "Express", Money::from_minor(7_99, USD))?;
        let options = DeliveryOptions::new([
            DeliveryOption::new("standard", "Standard", Money::from_minor(3_99, USD))?,
            express.clone(),
        ])?;
        let mut cart = Cart::new(CartId::generate(), USD).with_delivery_options(options);

        assert_eq!(cart.selected_delivery().map(|o| o.id.as_str()), Some("standard"));

        cart.select_delivery(&express);
        assert_eq!(cart.selected_delivery().map(|o| o.id.as_str()), Some("express"));

        Ok(())
    }
}
