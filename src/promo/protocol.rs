//! Promo application state machine.
//!
//! ```text
//! Empty ──enter──▶ Entering ──apply──▶ Validating ──ok──▶ Applied ──remove──▶ Empty
//!                     ▲                     │
//!                     └──────rejected───────┘
//! ```
//!
//! The transitions here are pure; the coordinator drives the validation call between
//! [`PromoState::begin_validation`] and [`PromoState::accept`] / [`PromoState::reject`].

use thiserror::Error;

use crate::promo::{PromoCode, normalize_code};

/// Transitions refused by the promo state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PromoFlowError {
    /// The code was blank.
    #[error("promo code is empty")]
    EmptyCode,

    /// A code is already applied and must be removed first.
    #[error("promo code {0} is already applied")]
    AlreadyApplied(String),

    /// A code is being validated.
    #[error("promo code {0} is being validated")]
    Validating(String),
}

/// Where the cart's promo entry currently stands.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PromoState {
    /// No code entered.
    #[default]
    Empty,

    /// The user is typing a code.
    Entering {
        /// Upper-cased input so far
        input: String,
    },

    /// A code has been submitted for validation.
    Validating {
        /// Code under validation
        code: String,
    },

    /// A code is applied to the cart.
    Applied(PromoCode),
}

impl PromoState {
    /// The applied promo, if any.
    pub fn applied(&self) -> Option<&PromoCode> {
        match self {
            PromoState::Applied(promo) => Some(promo),
            _ => None,
        }
    }

    /// Whether a validation call is outstanding.
    pub fn is_validating(&self) -> bool {
        matches!(self, PromoState::Validating { .. })
    }

    /// Records typed input, upper-cased as typed.
    ///
    /// # Errors
    ///
    /// Refuses input while a code is applied or being validated.
    pub fn enter(&mut self, input: &str) -> Result<(), PromoFlowError> {
        self.ensure_editable()?;

        *self = PromoState::Entering {
            input: input.to_uppercase(),
        };

        Ok(())
    }

    /// Moves to `Validating` and returns the normalised code to validate.
    ///
    /// # Errors
    ///
    /// [`PromoFlowError::EmptyCode`] for blank input (the state is left unchanged), or the
    /// [`PromoState::enter`] errors.
    pub fn begin_validation(&mut self, code: &str) -> Result<String, PromoFlowError> {
        self.ensure_editable()?;

        let code = normalize_code(code);
        if code.is_empty() {
            return Err(PromoFlowError::EmptyCode);
        }

        *self = PromoState::Validating { code: code.clone() };

        Ok(code)
    }

    /// Validation succeeded.
    pub fn accept(&mut self, promo: PromoCode) {
        *self = PromoState::Applied(promo);
    }

    /// Validation failed; the code goes back to the input for editing.
    pub fn reject(&mut self) {
        if let PromoState::Validating { code } = self {
            let input = std::mem::take(code);
            *self = PromoState::Entering { input };
        }
    }

    /// Clears any entered or applied code, returning the previously applied promo.
    ///
    /// # Errors
    ///
    /// Refuses while a code is being validated.
    pub fn remove(&mut self) -> Result<Option<PromoCode>, PromoFlowError> {
        if let PromoState::Validating { code } = self {
            return Err(PromoFlowError::Validating(code.clone()));
        }

        Ok(match std::mem::take(self) {
            PromoState::Applied(promo) => Some(promo),
            _ => None,
        })
    }

    fn ensure_editable(&self) -> Result<(), PromoFlowError> {
        match self {
            PromoState::Applied(promo) => Err(PromoFlowError::AlreadyApplied(promo.code().to_string())),
            PromoState::Validating { code } => Err(PromoFlowError::Validating(code.clone())),
            PromoState::Empty | PromoState::Entering { .. } => Ok(()),
        }
    }
}
