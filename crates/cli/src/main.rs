//! Bookshop CLI - browse the catalog, manage the cart and check out.
//!
//! # Usage
//!
//! ```bash
//! # Sign in and keep the token for later commands
//! export BOOKSHOP_TOKEN=$(bookshop login -u alice -p 'S3cret!pass')
//!
//! # Browse and fill the cart
//! bookshop books search --author Herbert
//! bookshop cart add 42 -q 2
//!
//! # Check out
//! bookshop checkout --first-name Alice --last-name Smith --address "1 Main St" \
//!     --city Springfield --state IL --zip-code 62704 --email alice@example.com \
//!     --phone 5551234567 --payment paypal
//!
//! # Follow up
//! bookshop orders list --status shipped
//! bookshop orders confirm 7
//!
//! # Keep the profile current
//! bookshop profile update --address "1 Looking Glass House"
//! ```
//!
//! # Environment Variables
//!
//! - `BOOKSHOP_TOKEN` - Bearer token of an existing session
//! - `BOOKSHOP_API_URL` - Backend base URL
//! - `SENTRY_DSN` - Optional error tracking
//! - `RUST_LOG` - Log filter (defaults to info for the bookshop crates)

#![cfg_attr(not(test), forbid(unsafe_code))]

use bookshop_storefront::StorefrontConfig;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{CommandError, Context};

#[derive(Parser)]
#[command(name = "bookshop")]
#[command(author, version, about = "Bookshop storefront CLI")]
struct Cli {
    /// Bearer token of an existing session
    #[arg(long, global = true, env = "BOOKSHOP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and print the session token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },
    /// Create an account
    Register(commands::auth::RegisterArgs),
    /// View or change the stored profile
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Browse the catalog
    Books {
        #[command(subcommand)]
        action: commands::books::BooksAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: commands::cart::CartAction,
    },
    /// Place an order for the current cart
    Checkout(commands::checkout::CheckoutArgs),
    /// Order history
    Orders {
        #[command(subcommand)]
        action: commands::orders::OrdersAction,
    },
    /// Admin dashboard
    Admin {
        #[command(subcommand)]
        action: commands::admin::AdminAction,
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
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bookshop_storefront=info,bookshop_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => exit_with(&CommandError::from(e)),
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, config).await {
        tracing::debug!(error = %e, "Command failed");
        exit_with(&e);
    }
}

#[allow(clippy::print_stderr)]
fn exit_with(error: &CommandError) -> ! {
    eprintln!("Error: {}", error.user_message());
    std::process::exit(1);
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CommandError> {
    let token = cli
        .token
        .filter(|t| !t.trim().is_empty())
        .map(SecretString::from)
        .or_else(|| config.api_token.clone());
    let ctx = Context::new(config, token);

    match cli.command {
        Commands::Login { username, password } => {
            commands::auth::login(&ctx, &username, &password).await
        }
        Commands::Register(args) => commands::auth::register(&ctx, args).await,
        Commands::Profile { action } => commands::profile::run(&ctx, action).await,
        Commands::Books { action } => commands::books::run(&ctx, action).await,
        Commands::Cart { action } => commands::cart::run(&ctx, action).await,
        Commands::Checkout(args) => commands::checkout::run(&ctx, args).await,
        Commands::Orders { action } => commands::orders::run(&ctx, action).await,
        Commands::Admin { action } => commands::admin::run(&ctx, action).await,
    }
}
