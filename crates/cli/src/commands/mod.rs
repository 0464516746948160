//! CLI subcommands.

pub mod migrate;
pub mod restock;
pub mod seed;

use secrecy::SecretString;
use shopline_storefront::db::{PgStore, create_pool};
use thiserror::Error;

/// Errors shared by commands that need the database.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read `STOREFRONT_DATABASE_URL` (falling back to `DATABASE_URL`).
///
/// # Errors
///
/// Returns `ConnectError::MissingEnvVar` if neither is set.
pub fn database_url() -> Result<SecretString, ConnectError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// Connect to the storefront database.
///
/// # Errors
///
/// Returns `ConnectError` if the URL is missing or the connection fails.
pub async fn connect() -> Result<PgStore, ConnectError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to storefront database...");
    let pool = create_pool(&database_url).await?;
    Ok(PgStore::new(pool))
}
