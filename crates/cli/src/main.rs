//! Shopfront CLI - Shopper client for the Shopfront backend.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (token is saved to SHOPFRONT_TOKEN_PATH)
//! SHOPFRONT_PASSWORD=... shop-cli login -e shopper@example.com
//!
//! # Browse the catalog; wishlisted products are marked with ♥
//! shop-cli products --search mango
//!
//! # Manage the wishlist
//! shop-cli wishlist add 42
//! shop-cli wishlist status 1 2 3
//! ```
//!
//! # Commands
//!
//! - `login`, `logout`, `whoami` - Session management
//! - `product`, `products` - Catalog
//! - `orders`, `order` - Order history
//! - `wishlist` - Wishlist listing, count and changes

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use shopfront_client::ClientConfig;
use shopfront_core::{OrderId, ProductId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{CliError, Context};

#[derive(Parser)]
#[command(name = "shop-cli")]
#[command(author, version, about = "Shopfront shopper CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(long, env = "SHOPFRONT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the saved session token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show one product
    Product {
        /// Product ID
        id: ProductId,
    },
    /// List products
    Products {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Page size (default: `SHOPFRONT_PAGE_SIZE`)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Filter by search term
        #[arg(short, long)]
        search: Option<String>,
    },
    /// List your orders
    Orders {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show one order
    Order {
        /// Order ID
        id: OrderId,
    },
    /// Manage your wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List wishlisted products
    List {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Print the number of wishlisted products
    Count,
    /// Add a product
    Add { id: ProductId },
    /// Remove a product
    Remove { id: ProductId },
    /// Add the product if absent, remove it otherwise
    Toggle { id: ProductId },
    /// Check whether products are wishlisted
    Status {
        #[arg(required = true)]
        ids: Vec<ProductId>,
    },
    /// Remove every product
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
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

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    // Defaults to info for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_client=info,shop_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let ctx = Context::new(config)?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(&ctx, &email, password).await?;
        }
        Commands::Logout => commands::auth::logout(&ctx),
        Commands::Whoami => commands::auth::whoami(&ctx).await?,
        Commands::Product { id } => commands::catalog::product(&ctx, id).await?,
        Commands::Products {
            page,
            limit,
            search,
        } => commands::catalog::products(&ctx, page, limit, search.as_deref()).await?,
        Commands::Orders { page, limit } => commands::catalog::orders(&ctx, page, limit).await?,
        Commands::Order { id } => commands::catalog::order(&ctx, id).await?,
        Commands::Wishlist { action } => match action {
            WishlistAction::List { page, limit } => {
                commands::wishlist::list(&ctx, page, limit).await?;
            }
            WishlistAction::Count => commands::wishlist::count(&ctx).await?,
            WishlistAction::Add { id } => commands::wishlist::add(&ctx, id).await?,
            WishlistAction::Remove { id } => commands::wishlist::remove(&ctx, id).await?,
            WishlistAction::Toggle { id } => commands::wishlist::toggle(&ctx, id).await?,
            WishlistAction::Status { ids } => commands::wishlist::status(&ctx, &ids).await?,
            WishlistAction::Clear => commands::wishlist::clear(&ctx).await?,
        },
    }

    ctx.wishlist.shutdown();
    Ok(())
}
