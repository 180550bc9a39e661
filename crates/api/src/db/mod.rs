//! Database operations for the Cartwheel `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `users` - Accounts (email login, argon2 password hash, staff flag)
//! - `revoked_tokens` - Refresh token IDs revoked at logout
//! - `password_reset_tokens` - Hashed one-time reset tokens
//! - `categories`, `products` - Catalog
//! - `cart_items` - One implicit cart per user
//! - `orders`, `order_items` - Orders with snapshotted unit prices
//! - `payments` - Stripe payment intents per order
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p cartwheel-cli -- migrate
//! ```

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod tokens;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::CartRepository;
pub use catalog::CatalogRepository;
pub use payments::PaymentRepository;
pub use tokens::TokenRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("{0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
///
/// Any other error is passed through as `RepositoryError::Database`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(err)
}

/// Escape `LIKE` wildcards in user-supplied search text and wrap it in `%`.
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_wraps() {
        assert_eq!(like_pattern("shoe"), "%shoe%");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_conflict_passes_through_non_database_errors() {
        let err = conflict_on_unique(sqlx::Error::RowNotFound, "taken");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
