//! Authentication service.
//!
//! Password accounts with JWT sessions: registration, login, token refresh
//! and revocation, password changes and email-based resets.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use cartwheel_core::{Email, UserId, Username};

use crate::db::users::NewUser;
use crate::db::{RepositoryError, TokenRepository, UserRepository};
use crate::models::user::{ProfileUpdate, User};
use crate::services::tokens::{TokenError, TokenPair, TokenService, TokenType};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Length of the random password reset token.
const RESET_TOKEN_LENGTH: usize = 48;

/// How long a reset token stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

const MAX_PHONE_LENGTH: usize = 20;
const MAX_ADDRESS_LENGTH: usize = 500;
const MAX_NAME_LENGTH: usize = 150;

/// Passwords rejected regardless of length.
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "12345678",
    "123456789",
    "qwertyuiop",
    "iloveyou",
    "sunshine",
    "football",
    "baseball",
    "welcome1",
];

/// Registration input, as received from the client.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub password2: &'a str,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens_repo: TokenRepository<'a>,
    tokens: &'a TokenService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tokens: &'a TokenService) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens_repo: TokenRepository::new(pool),
            tokens,
        }
    }

    // =========================================================================
    // Registration and login
    // =========================================================================

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::InvalidUsername` for
    /// malformed input, `AuthError::PasswordMismatch` or
    /// `AuthError::WeakPassword` for bad passwords, and
    /// `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, input: Registration<'_>) -> Result<User, AuthError> {
        let email = Email::parse(input.email)?;
        let username = Username::parse(input.username)?;

        if input.password != input.password2 {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(input.password)?;

        let password_hash = hash_password(input.password)?;

        let user = self
            .users
            .create(NewUser {
                email: &email,
                username: &username,
                password_hash: &password_hash,
                is_staff: false,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        Ok(user)
    }

    /// Login with email and password, returning the user and a token pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// or the account is inactive.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.tokens.issue_pair(&user)?;
        Ok((user, pair))
    }

    // =========================================================================
    // Token lifecycle
    // =========================================================================

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if the token is invalid, expired, revoked,
    /// of the wrong type, or its user no longer exists or is inactive.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;

        if self.tokens_repo.is_revoked(claims.jti).await? {
            return Err(TokenError::Revoked.into());
        }

        let user = self
            .users
            .get_by_id(claims.user_id()?)
            .await?
            .filter(|u| u.is_active)
            .ok_or(TokenError::Invalid)?;

        Ok(self.tokens.issue(&user, TokenType::Access)?)
    }

    /// Revoke a refresh token belonging to `user_id`.
    ///
    /// Revoking an already-revoked token succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if the token is not a valid refresh token
    /// and `AuthError::NotTokenOwner` if it was issued to another user.
    pub async fn logout(&self, user_id: UserId, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;

        if claims.user_id()? != user_id {
            return Err(AuthError::NotTokenOwner);
        }

        self.tokens_repo
            .revoke(claims.jti, claims.expires_at())
            .await?;

        // Opportunistic cleanup; failure here does not affect logout.
        if let Err(e) = self.tokens_repo.purge_expired_revocations().await {
            tracing::warn!(error = %e, "Failed to purge expired token revocations");
        }

        Ok(())
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Change a user's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IncorrectPassword` if `old_password` is wrong,
    /// `AuthError::PasswordMismatch` or `AuthError::WeakPassword` for a bad
    /// new password.
    pub async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        password: &str,
        password2: &str,
    ) -> Result<(), AuthError> {
        let current = self
            .users
            .get_password_hash(user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        verify_password(old_password, &current).map_err(|_| AuthError::IncorrectPassword)?;

        if password != password2 {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(password)?;

        let hash = hash_password(password)?;
        self.users.set_password_hash(user_id, &hash).await?;
        Ok(())
    }

    /// Start a password reset.
    ///
    /// Returns the user and the raw token to send them, or `None` when no
    /// active account has this email. Callers must respond the same way in
    /// both cases.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed address.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, AuthError> {
        let email = Email::parse(email)?;

        let Some(user) = self.users.get_by_email(&email).await?.filter(|u| u.is_active) else {
            return Ok(None);
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        self.tokens_repo
            .create_reset_token(user.id, &hash_reset_token(&token), expires_at)
            .await?;

        Ok(Some((user, token)))
    }

    /// Finish a password reset with the emailed token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` if the token is unknown, used
    /// or expired, `AuthError::PasswordMismatch` or `AuthError::WeakPassword`
    /// for a bad new password.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        password: &str,
        password2: &str,
    ) -> Result<UserId, AuthError> {
        if password != password2 {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(password)?;

        let hash = hash_password(password)?;
        self.tokens_repo
            .consume_reset_token(&hash_reset_token(token), &hash)
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Validate and apply a profile update.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidProfile` if a field is too long.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, AuthError> {
        validate_profile(update)?;
        Ok(self.users.update_profile(user_id, update).await?)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Validate password strength.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is short, all digits
/// or a common password.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword(
            "This password is entirely numeric.".to_string(),
        ));
    }

    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        return Err(AuthError::WeakPassword(
            "This password is too common.".to_string(),
        ));
    }

    Ok(())
}

fn validate_profile(update: &ProfileUpdate) -> Result<(), AuthError> {
    let too_long = |field: &str, value: Option<&str>, max: usize| match value {
        Some(v) if v.chars().count() > max => Err(AuthError::InvalidProfile(format!(
            "{field}: ensure this field has no more than {max} characters."
        ))),
        _ => Ok(()),
    };

    too_long("first_name", update.first_name.as_deref(), MAX_NAME_LENGTH)?;
    too_long("last_name", update.last_name.as_deref(), MAX_NAME_LENGTH)?;
    too_long("phone", update.phone.as_ref().and_then(Option::as_deref), MAX_PHONE_LENGTH)?;
    too_long(
        "address",
        update.address.as_ref().and_then(Option::as_deref),
        MAX_ADDRESS_LENGTH,
    )?;

    if let Some(Some(dob)) = update.date_of_birth
        && dob > Utc::now().date_naive()
    {
        return Err(AuthError::InvalidProfile(
            "date_of_birth: cannot be in the future.".to_string(),
        ));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a random alphanumeric reset token.
fn generate_reset_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest of a reset token, as stored in the database.
fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
