//! Configuration
//!
//! Pricing constants, coordinator timeouts and logging settings, read from CLI arguments or the
//! environment. Every group has defaults, so the library works without any of it.

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, ValueEnum};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    coordinator::CoordinatorConfig,
    money::{AmountError, find_currency, price_from_decimal},
    pricing::PricingConfig,
    replay::Step,
};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown or unsupported currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Tax rate outside `[0, 1]`
    #[error("Tax rate must be between 0 and 1, got {0}")]
    TaxRateOutOfRange(Decimal),

    /// A configured amount is invalid
    #[error("Invalid {what}")]
    Amount {
        /// Which setting
        what: &'static str,

        /// Underlying validation error
        #[source]
        source: AmountError,
    },
}

/// Pricing settings.
#[derive(Debug, Clone, Args)]
pub struct PricingArgs {
    /// ISO currency code
    #[arg(long, env = "CART_CURRENCY", default_value = "USD")]
    pub currency: String,

    /// Tax rate as a fraction of the taxable amount
    #[arg(long, env = "CART_TAX_RATE", default_value = "0.08")]
    pub tax_rate: Decimal,

    /// Flat service fee in major units
    #[arg(long, env = "CART_SERVICE_FEE", default_value = "1.99")]
    pub service_fee: Decimal,

    /// Delivery fee when no delivery option is selected, in major units
    #[arg(long, env = "CART_FALLBACK_DELIVERY_FEE", default_value = "3.99")]
    pub fallback_delivery_fee: Decimal,
}

impl Default for PricingArgs {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            tax_rate: Decimal::new(8, 2),
            service_fee: Decimal::new(1_99, 2),
            fallback_delivery_fee: Decimal::new(3_99, 2),
        }
    }
}

impl PricingArgs {
    /// Validates the settings into pricing constants.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for unknown currencies, tax rates outside `[0, 1]` and amounts
    /// that are negative or too precise.
    pub fn resolve(&self) -> Result<PricingConfig, ConfigError> {
        let currency = find_currency(&self.currency)
            .ok_or_else(|| ConfigError::UnknownCurrency(self.currency.clone()))?;

        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE {
            return Err(ConfigError::TaxRateOutOfRange(self.tax_rate));
        }

        let service_fee =
            price_from_decimal(self.service_fee, currency).map_err(|source| ConfigError::Amount {
                what: "service fee",
                source,
            })?;

        let fallback_delivery_fee = price_from_decimal(self.fallback_delivery_fee, currency)
            .map_err(|source| ConfigError::Amount {
                what: "fallback delivery fee",
                source,
            })?;

        Ok(PricingConfig {
            currency,
            tax_rate: self.tax_rate,
            service_fee,
            fallback_delivery_fee,
        })
    }
}

/// Coordinator settings.
#[derive(Debug, Clone, Copy, Args)]
pub struct CoordinatorArgs {
    /// Boundary call timeout in milliseconds
    #[arg(long, env = "CART_BOUNDARY_TIMEOUT_MS", default_value_t = 10_000_u64)]
    pub boundary_timeout_ms: u64,
}

impl Default for CoordinatorArgs {
    fn default() -> Self {
        Self {
            boundary_timeout_ms: 10_000,
        }
    }
}

impl CoordinatorArgs {
    /// The coordinator configuration these settings describe.
    pub fn resolve(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            boundary_timeout: Duration::from_millis(self.boundary_timeout_ms),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    #[default]
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

/// Trolley CLI configuration
#[derive(Debug, Parser)]
#[command(
    name = "trolley",
    about = "Replay cart actions against a cart snapshot",
    long_about = None
)]
pub struct Config {
    /// Cart snapshot file (YAML or JSON)
    #[arg(value_name = "SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Steps to replay in order, e.g. `quantity:pad-thai:3`, `promo:SAVE5`, `checkout`
    #[arg(short, long = "step", value_name = "STEP")]
    pub steps: Vec<Step>,

    /// Pricing settings.
    #[command(flatten)]
    pub pricing: PricingArgs,

    /// Coordinator settings.
    #[command(flatten)]
    pub coordinator: CoordinatorArgs,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}
