//! Delivery Options

use thiserror::Error;

use crate::money::{self, AmountError, Price};

/// Errors raised while building a delivery option set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// More than one option was flagged as the default.
    #[error("delivery options {0} and {1} are both flagged as default")]
    MultipleDefaults(String, String),

    /// Two options share an id.
    #[error("duplicate delivery option id: {0}")]
    DuplicateId(String),
}

/// A way of getting the order to the customer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOption {
    /// Option id
    pub id: String,

    /// Display name
    pub name: String,

    /// Delivery fee
    pub price: Price,

    /// Whether this option is preselected
    pub is_default: bool,
}

impl DeliveryOption {
    /// Creates a non-default delivery option.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::NegativePrice`] if the fee is negative.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Price,
    ) -> Result<Self, AmountError> {
        Ok(Self {
            id: id.into(),
            name: name.into(),
            price: money::non_negative(price)?,
            is_default: false,
        })
    }

    /// Flags this option as the default.
    #[must_use]
    pub fn default_option(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// The set of delivery options offered for a cart, with at most one default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryOptions {
    options: Vec<DeliveryOption>,
}

impl DeliveryOptions {
    /// Validates and wraps a list of options.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] on duplicate ids or multiple defaults.
    pub fn new(options: impl Into<Vec<DeliveryOption>>) -> Result<Self, DeliveryError> {
        let options = options.into();

        let mut default: Option<&DeliveryOption> = None;

        for (idx, option) in options.iter().enumerate() {
            if options
                .iter()
                .skip(idx + 1)
                .any(|other| other.id == option.id)
            {
                return Err(DeliveryError::DuplicateId(option.id.clone()));
            }

            if option.is_default {
                if let Some(existing) = default {
                    return Err(DeliveryError::MultipleDefaults(
                        existing.id.clone(),
                        option.id.clone(),
                    ));
                }

                default = Some(option);
            }
        }

        Ok(Self { options })
    }

    /// The option selected when nothing has been chosen yet: the flagged default, else the first
    /// option, else none.
    pub fn initial_selection(&self) -> Option<&DeliveryOption> {
        self.options
            .iter()
            .find(|option| option.is_default)
            .or_else(|| self.options.first())
    }

    /// Looks up an option by id.
    pub fn get(&self, id: &str) -> Option<&DeliveryOption> {
        self.options.iter().find(|option| option.id == id)
    }

    /// Iterate over the options in display order.
    pub fn iter(&self) -> impl Iterator<Item = &DeliveryOption> {
        self.options.iter()
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether there are no options.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use super::*;

    fn standard() -> TestResult<DeliveryOption> {
        Ok(DeliveryOption::new("standard", "Standard", Money::from_minor(3_99, USD))?)
    }

    fn express() -> TestResult<DeliveryOption> {
        Ok(DeliveryOption::new("express", "Express", Money::from_minor(7_99, USD))?)
    }

    #[test]
    fn initial_selection_prefers_flagged_default() -> TestResult {
        let options = DeliveryOptions::new([standard()?, express()?.default_option()])?;

        assert_eq!(
            options.initial_selection().map(|o| o.id.as_str()),
            Some("express")
        );

        Ok(())
    }

    #[test]
    fn initial_selection_falls_back_to_first() -> TestResult {
        let options = DeliveryOptions::new([express()?, standard()?])?;

        assert_eq!(
            options.initial_selection().map(|o| o.id.as_str()),
            Some("express")
        );

        Ok(())
    }

    #[test]
    fn initial_selection_of_empty_set_is_none() {
        assert!(DeliveryOptions::default().initial_selection().is_none());
    }

    #[test]
    fn rejects_multiple_defaults() -> TestResult {
        let result =
            DeliveryOptions::new([standard()?.default_option(), express()?.default_option()]);

        assert_eq!(
            result,
            Err(DeliveryError::MultipleDefaults(
                "standard".to_string(),
                "express".to_string()
            ))
        );

        Ok(())
    }

    #[test]
    fn rejects_duplicate_ids() -> TestResult {
        let result = DeliveryOptions::new([standard()?, standard()?]);

        assert_eq!(
            result,
            Err(DeliveryError::DuplicateId("standard".to_string()))
        );

        Ok(())
    }

    #[test]
    fn rejects_negative_fee() {
        let result = DeliveryOption::new("refund", "Refund", Money::from_minor(-5_00, USD));

        assert_eq!(result, Err(AmountError::NegativePrice(-5_00)));
    }
}
