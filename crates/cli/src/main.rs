//! Retail CLI - Database migrations, cart maintenance and backend seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations (cart lines + sessions)
//! retail-cli migrate
//!
//! # Inspect or empty a user's cart
//! retail-cli cart show --owner alice
//! retail-cli cart clear --owner alice
//!
//! # Check out a user's cart against the configured backend
//! retail-cli cart checkout --owner alice
//!
//! # Load demo customers and products into the backend
//! retail-cli seed catalog -f seed/catalog.json
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `cart` - Show, clear or check out a cart
//! - `seed` - Seed the remote backend

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "retail-cli")]
#[command(author, version, about = "Retail storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Inspect and maintain carts
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Seed the remote backend
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the lines of a cart
    Show {
        /// Cart owner username
        #[arg(short, long)]
        owner: String,
    },
    /// Remove every line of a cart
    Clear {
        /// Cart owner username
        #[arg(short, long)]
        owner: String,
    },
    /// Submit one order per cart line
    Checkout {
        /// Cart owner username
        #[arg(short, long)]
        owner: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Create customers and products from a JSON file
    Catalog {
        /// Path to the catalog JSON file
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Cart { action } => match action {
            CartAction::Show { owner } => commands::cart::show(&owner).await?,
            CartAction::Clear { owner } => commands::cart::clear(&owner).await?,
            CartAction::Checkout { owner } => commands::cart::checkout(&owner).await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
    }
    Ok(())
}
