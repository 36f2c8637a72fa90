//! Bazaar CLI - cart and wishlist from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! bazaar cart show
//!
//! # Add a product, then one more unit of it
//! bazaar cart add 64f1c0ffee
//! bazaar cart incr 64f1c0ffee
//!
//! # Heart / un-heart a product
//! bazaar wishlist toggle 64f1c0ffee
//!
//! # Machine-readable output
//! bazaar --json wishlist show
//! ```
//!
//! # Environment Variables
//!
//! - `BAZAAR_API_URL` - Base URL of the REST backend (required)
//! - `BAZAAR_SESSION_TOKEN` - Bearer token of the signed-in customer
//! - `SENTRY_DSN` - Sentry error tracking
//! - `RUST_LOG` - Log filter (logs go to stderr)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use bazaar_core::ProductId;
use bazaar_storefront::config::StorefrontConfig;
use bazaar_storefront::state::AppState;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::cart::CartAction;
use commands::wishlist::WishlistAction;
use output::Output;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar cart and wishlist")]
struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Show or change the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Show product details
    Product {
        /// Product id
        product_id: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bazaar_storefront=info,bazaar_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration is needed before Sentry, and Sentry before tracing
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let output = if cli.json { Output::Json } else { Output::Text };

    match run(cli.command, config, output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Commands,
    config: StorefrontConfig,
    output: Output,
) -> Result<(), commands::CommandError> {
    let state = AppState::new(config)?;

    match command {
        Commands::Cart { action } => commands::cart::run(&state, action, output).await,
        Commands::Wishlist { action } => commands::wishlist::run(&state, action, output).await,
        Commands::Product { product_id } => {
            let product = state.catalog().product(&ProductId::new(product_id)).await?;
            output.product(&product, state.config().currency)
        }
    }
}
