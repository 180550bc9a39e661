//! Token bookkeeping: revoked refresh tokens and password reset tokens.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cartwheel_core::UserId;

use super::RepositoryError;

/// Repository for token database operations.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepository<'a> {
    /// Create a new token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Revoke a refresh token by its `jti`. Revoking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2) \
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Whether a refresh token has been revoked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError> {
        let revoked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)",
        )
        .bind(jti)
        .fetch_one(self.pool)
        .await?;

        Ok(revoked)
    }

    /// Drop revocations for tokens that have expired anyway.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired_revocations(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Store a password reset token digest for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_reset_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (token_hash, user_id, expires_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Consume a reset token and set the user's new password hash.
    ///
    /// Runs in one transaction: the token row is locked, must be unused and
    /// unexpired, and is marked used alongside the password change.
    ///
    /// Returns the user whose password changed, or `None` if the token is
    /// unknown, used or expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query_scalar::<_, UserId>(
            "SELECT user_id FROM password_reset_tokens \
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW() \
             FOR UPDATE",
        )
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            return Ok(None);
        };

        sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(new_password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(user_id))
    }
}
