//! Subcommand implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use cartwheel_api::db;
use secrecy::SecretString;
use sqlx::PgPool;

/// Connection string from `API_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();

    std::env::var("API_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|url| !url.is_empty())
        .map(SecretString::from)
}

/// Connect to the API database.
async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let url = database_url().ok_or("API_DATABASE_URL (or DATABASE_URL) not set")?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&url).await?)
}
