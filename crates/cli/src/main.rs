//! Shopline CLI - Database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! shopline-cli migrate
//!
//! # Seed categories and products from YAML
//! shopline-cli seed catalog.yaml
//!
//! # Add stock to a product
//! shopline-cli restock --product 12 --amount 40
//! ```
//!
//! All commands read `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`), loading
//! `.env` if present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shopline-cli")]
#[command(author, version, about = "Shopline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed categories and products from a YAML file
    Seed {
        /// Path to the seed file
        file: PathBuf,
    },
    /// Add stock to a product
    Restock {
        /// Product ID
        #[arg(short, long)]
        product: i32,

        /// Units to add (at least 1)
        #[arg(short, long)]
        amount: i32,
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
        Commands::Seed { file } => {
            commands::seed::catalog(&file).await?;
        }
        Commands::Restock { product, amount } => {
            commands::restock::run(product, amount).await?;
        }
    }
    Ok(())
}
