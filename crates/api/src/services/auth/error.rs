//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::tokens::TokenError;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("Enter a valid email address: {0}")]
    InvalidEmail(#[from] cartwheel_core::EmailError),

    /// Invalid username.
    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] cartwheel_core::UsernameError),

    /// A profile field failed validation.
    #[error("{0}")]
    InvalidProfile(String),

    /// Wrong email/password, or the account is inactive.
    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("user with this email already exists.")]
    UserAlreadyExists,

    /// Password too weak.
    #[error("{0}")]
    WeakPassword(String),

    /// `password` and `password2` differ.
    #[error("Password fields didn't match.")]
    PasswordMismatch,

    /// The current password given for a change is wrong.
    #[error("Old password is not correct")]
    IncorrectPassword,

    /// Reset token unknown, used or expired.
    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    /// A refresh token presented at logout belongs to another user.
    #[error("Token does not belong to this user")]
    NotTokenOwner,

    /// Token issue or verification failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
