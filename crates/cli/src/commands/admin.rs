//! Staff user management.
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` - `PostgreSQL` connection string
//! - `CW_ADMIN_PASSWORD` - Password for the new user (kept out of shell history)

use cartwheel_api::db::users::NewUser;
use cartwheel_api::db::{RepositoryError, UserRepository};
use cartwheel_api::services::auth::{hash_password, validate_password};
use cartwheel_core::{Email, UserId, Username};
use thiserror::Error;

/// Environment variable holding the new user's password.
pub const PASSWORD_ENV: &str = "CW_ADMIN_PASSWORD";

/// Errors that can occur while creating a staff user.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Invalid username.
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Password rejected by the password policy.
    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),
}

/// Create a staff user.
///
/// # Errors
///
/// Returns an error for invalid input, an existing email or a database failure.
pub async fn create_admin(email: &str, username: &str) -> Result<UserId, Box<dyn std::error::Error>> {
    let email = Email::parse(email).map_err(|e| AdminError::InvalidEmail(e.to_string()))?;
    let username =
        Username::parse(username).map_err(|e| AdminError::InvalidUsername(e.to_string()))?;

    dotenvy::dotenv().ok();
    let password =
        std::env::var(PASSWORD_ENV).map_err(|_| AdminError::MissingEnvVar(PASSWORD_ENV))?;
    validate_password(&password).map_err(|e| AdminError::InvalidPassword(e.to_string()))?;
    let password_hash = hash_password(&password)?;

    let pool = super::connect().await?;

    tracing::info!("Creating staff user: {}", email);
    let user = UserRepository::new(&pool)
        .create(NewUser {
            email: &email,
            username: &username,
            password_hash: &password_hash,
            is_staff: true,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => AdminError::Database(other),
        })?;

    tracing::info!(
        "Staff user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}
