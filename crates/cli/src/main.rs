//! Dawa CLI - Inspect and edit marketplace data from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the signed-in user's wishlist
//! dawa wishlist list
//!
//! # Add or remove an item
//! dawa wishlist toggle 42
//!
//! # Remove an item if present
//! dawa wishlist remove 42
//!
//! # Fetch and normalize a product listing
//! dawa products products/ --field results
//! ```
//!
//! # Configuration
//!
//! Read from the environment (or `.env`); see `dawa_storefront::config`.
//! Wishlist commands need `DAWA_API_TOKEN`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use dawa_core::ProductId;
use dawa_storefront::wishlist::SentryObserver;
use dawa_storefront::{AppContext, StorefrontConfig};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "dawa")]
#[command(author, version, about = "Dawa marketplace CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or edit the signed-in user's wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Fetch a product listing and print it normalized
    Products {
        /// Endpoint path relative to the API base URL
        path: String,

        /// Name of the array field in the response object
        #[arg(short, long, default_value = "results")]
        field: String,
    },
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List wishlist items
    List,
    /// Report whether an item is in the wishlist
    Check { id: ProductId },
    /// Add the item if absent, remove it if present
    Toggle { id: ProductId },
    /// Remove the item if present
    Remove { id: ProductId },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
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
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dawa_storefront=info,dawa_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(&config);
    init_tracing();

    let result = run(cli, config, sentry_guard.is_some()).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(
    cli: Cli,
    config: StorefrontConfig,
    report_to_sentry: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = AppContext::new(config)?;
    if report_to_sentry {
        ctx.wishlist().add_observer(Arc::new(SentryObserver));
    }

    match cli.command {
        Commands::Wishlist { action } => match action {
            WishlistAction::List => commands::wishlist::list(&ctx).await?,
            WishlistAction::Check { id } => commands::wishlist::check(&ctx, &id).await?,
            WishlistAction::Toggle { id } => commands::wishlist::toggle(&ctx, id).await?,
            WishlistAction::Remove { id } => commands::wishlist::remove(&ctx, id).await?,
        },
        Commands::Products { path, field } => {
            commands::products::list(&ctx, &path, &field).await?;
        }
    }
    Ok(())
}
