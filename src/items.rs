//! Items

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::money::{self, AmountError, DiscountPercent, Price, Quantity};

/// Stable identity of an item within a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new item id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An extra priced onto a cart line, e.g. "extra cheese".
#[derive(Debug, Clone, PartialEq)]
pub struct Addon {
    name: String,
    unit_price: Price,
    quantity: Quantity,
}

impl Addon {
    /// Creates a new addon.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::NegativePrice`] if the unit price is negative.
    pub fn new(
        name: impl Into<String>,
        unit_price: Price,
        quantity: Quantity,
    ) -> Result<Self, AmountError> {
        Ok(Self {
            name: name.into(),
            unit_price: money::non_negative(unit_price)?,
            quantity,
        })
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Price of a single addon unit
    pub fn unit_price(&self) -> &Price {
        &self.unit_price
    }

    /// Number of addon units on the line
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// `unit_price * quantity` in minor units.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] if the product overflows.
    pub fn total_minor(&self) -> Result<i64, AmountError> {
        money::times(self.unit_price.to_minor_units(), self.quantity.get())
    }
}

/// The option chosen for a variation group (e.g. size → "large").
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    /// Chosen option.
    pub option: String,

    /// Per-unit price delta the option adds, if any.
    pub price_delta: Option<Price>,
}

impl Variation {
    /// A display-only variation with no price impact.
    pub fn new(option: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            price_delta: None,
        }
    }

    /// A variation that adds `delta` to the unit price.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::NegativePrice`] if the delta is negative.
    pub fn priced(option: impl Into<String>, delta: Price) -> Result<Self, AmountError> {
        Ok(Self {
            option: option.into(),
            price_delta: Some(money::non_negative(delta)?),
        })
    }
}

/// An item in the priced cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    id: ItemId,
    name: String,
    base_price: Price,
    quantity: Quantity,
    discount: Option<DiscountPercent>,
    addons: SmallVec<[Addon; 4]>,
    variations: FxHashMap<String, Variation>,
    instructions: Option<String>,
}

/// An item parked outside the priced cart; same shape as a cart item.
pub type SavedItem = CartItem;

impl CartItem {
    /// Creates a single-unit item.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::ZeroPrice`] or [`AmountError::NegativePrice`] when the base price is
    /// not strictly positive.
    pub fn new(
        id: impl Into<ItemId>,
        name: impl Into<String>,
        base_price: Price,
    ) -> Result<Self, AmountError> {
        let minor = base_price.to_minor_units();
        if minor < 0 {
            return Err(AmountError::NegativePrice(minor));
        }
        if minor == 0 {
            return Err(AmountError::ZeroPrice);
        }

        Ok(Self {
            id: id.into(),
            name: name.into(),
            base_price,
            quantity: Quantity::ONE,
            discount: None,
            addons: SmallVec::new(),
            variations: FxHashMap::default(),
            instructions: None,
        })
    }

    /// Sets the quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets an item-level discount.
    #[must_use]
    pub fn with_discount(mut self, discount: DiscountPercent) -> Self {
        self.discount = Some(discount);
        self
    }

    /// Appends an addon.
    #[must_use]
    pub fn with_addon(mut self, addon: Addon) -> Self {
        self.addons.push(addon);
        self
    }

    /// Chooses an option for a variation group.
    #[must_use]
    pub fn with_variation(mut self, group: impl Into<String>, variation: Variation) -> Self {
        self.variations.insert(group.into(), variation);
        self
    }

    /// Attaches free-text preparation instructions.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Item id
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base unit price
    pub fn base_price(&self) -> &Price {
        &self.base_price
    }

    /// Quantity
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Item-level discount, if any
    pub fn discount(&self) -> Option<DiscountPercent> {
        self.discount
    }

    /// Addons in the order they were chosen
    pub fn addons(&self) -> &[Addon] {
        &self.addons
    }

    /// Variation selections
    pub fn variations(&self) -> &FxHashMap<String, Variation> {
        &self.variations
    }

    /// Preparation instructions
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub(crate) fn set_quantity(&mut self, quantity: Quantity) {
        self.quantity = quantity;
    }

    /// Unit price including any variation deltas, in minor units.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] on overflow.
    pub fn unit_price_minor(&self) -> Result<i64, AmountError> {
        let deltas = self
            .variations
            .values()
            .filter_map(|variation| variation.price_delta.map(|delta| delta.to_minor_units()));

        money::sum(std::iter::once(self.base_price.to_minor_units()).chain(deltas))
    }

    /// Pre-discount line total: `unit price * quantity + Σ addon totals`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] on overflow.
    pub fn line_total_minor(&self) -> Result<i64, AmountError> {
        let units = money::times(self.unit_price_minor()?, self.quantity.get())?;
        let addons = self
            .addons
            .iter()
            .map(Addon::total_minor)
            .collect::<Result<SmallVec<[i64; 4]>, _>>()?;

        money::sum(std::iter::once(units).chain(addons))
    }

    /// Item-level discount on the full line total (addons included).
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] on overflow.
    pub fn discount_minor(&self) -> Result<i64, AmountError> {
        match self.discount {
            Some(discount) if !discount.is_zero() => {
                money::percent_of_minor(&discount.as_percentage(), self.line_total_minor()?)
            }
            _ => Ok(0),
        }
    }
}
