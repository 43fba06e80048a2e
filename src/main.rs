//! Trolley CLI
//!
//! Loads a cart snapshot, replays scripted steps against an in-process backend and prints the
//! resulting summary.

use std::{
    io::{self, Write},
    process,
};

use jiff::Timestamp;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Registry,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

use trolley::{
    boundary::LocalBackend,
    config::{Config, ConfigError, LogFormat, LoggingConfig},
    coordinator::{Boundaries, CartCoordinator},
    errors::CartError,
    pricing::PricingError,
    snapshot::{CartSnapshot, SnapshotError},
};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

#[tokio::main]
pub async fn main() {
    let config = Config::load().unwrap_or_else(|error| error.exit());

    if let Err(error) = init_subscriber(&config.logging) {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized, must use eprintln for subscriber errors"
        )]
        {
            eprintln!("Failed to initialise logging: {error}");
        }

        process::exit(1);
    }

    if let Err(error) = run(config).await {
        error!("{error}");
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), CliError> {
    let pricing = config.pricing.resolve()?;
    let snapshot = CartSnapshot::load(&config.snapshot)?;

    let cart = snapshot.to_cart(Timestamp::now())?;
    let backend = LocalBackend::new(snapshot.promo_catalogue()?);

    let coordinator = CartCoordinator::new(
        cart,
        pricing,
        config.coordinator.resolve(),
        Boundaries::shared(backend),
    )?;

    info!(
        cart = %coordinator.cart_id(),
        steps = config.steps.len(),
        "replaying steps"
    );

    for step in &config.steps {
        match step.run(&coordinator).await {
            Ok(message) => info!(%step, "{message}"),
            Err(error) if error.is_user_visible() => warn!(%step, "{error}"),
            Err(error) => return Err(error.into()),
        }
    }

    let view = coordinator.view();
    let mut out = io::stdout().lock();

    view.summary.write_to(&mut out)?;
    out.flush()?;

    Ok(())
}

fn init_subscriber(config: &LoggingConfig) -> Result<(), TryInitError> {
    match config.log_format {
        LogFormat::Compact => init_with_layer(
            config,
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_writer(io::stderr),
        ),
        LogFormat::Json => init_with_layer(
            config,
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_writer(io::stderr),
        ),
    }
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

fn init_with_layer<L>(config: &LoggingConfig, fmt_layer: L) -> Result<(), TryInitError>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(build_env_filter(config))
        .try_init()
}
