//! Vinyl Vibe cart CLI.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart (guest or signed-in, depending on the stored token)
//! vv-cart show
//!
//! # Add two copies of a record
//! vv-cart add 65f1c0de -q 2
//!
//! # Sign in and merge the guest cart into the account cart
//! vv-cart login "$ACCESS_TOKEN"
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart
//! - `add` / `update` / `remove` - Edit a line
//! - `login` / `logout` - Store or drop the access token
//! - `clear` - Empty the local cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vinyl_vibe_cart::config::CartConfig;

mod commands;

#[derive(Parser)]
#[command(name = "vv-cart")]
#[command(author, version, about = "Vinyl Vibe cart client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current cart
    Show,
    /// Add a product to the cart
    Add {
        /// Product ID
        product_id: String,

        /// Quantity to add
        #[arg(short, long)]
        quantity: Option<u32>,
    },
    /// Set the quantity of a cart line
    Update {
        /// Product ID
        product_id: String,

        /// New quantity
        quantity: u32,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        product_id: String,
    },
    /// Store an access token and merge the guest cart into the account cart
    Login {
        /// Access token issued by the shop
        token: String,
    },
    /// Forget the access token
    Logout,
    /// Empty the local cart (the account cart on the server is kept)
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
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

    Some(guard)
}

/// Warnings and errors become Sentry events; info and debug become breadcrumbs.
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

    let config = CartConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // stdout carries the cart; logs go to stderr
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vinyl_vibe_cart=info,vinyl_vibe_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), commands::CommandError> {
    let session = commands::CartSession::open(config);

    match cli.command {
        Commands::Show => commands::cart::show(&session).await,
        Commands::Add {
            product_id,
            quantity,
        } => commands::cart::add(&session, product_id, quantity).await,
        Commands::Update {
            product_id,
            quantity,
        } => commands::cart::update(&session, product_id, quantity).await,
        Commands::Remove { product_id } => commands::cart::remove(&session, product_id).await,
        Commands::Login { token } => commands::cart::login(&session, &token).await,
        Commands::Logout => commands::cart::logout(&session).await,
        Commands::Clear => commands::cart::clear(&session),
    }
}
