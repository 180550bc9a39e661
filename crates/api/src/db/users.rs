//! User repository for database operations.
//!
//! Queries are built at runtime with `sqlx::query_as` and mapped through
//! row types that validate into domain types.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use cartwheel_core::{Email, UserId, Username};

use super::{RepositoryError, conflict_on_unique, like_pattern};
use crate::models::user::{ProfileUpdate, User};

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, phone, date_of_birth, \
                            address, is_staff, is_active, created_at, updated_at";

/// Row type for the `users` table.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    date_of_birth: Option<NaiveDate>,
    address: Option<String>,
    is_staff: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            username,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            date_of_birth: row.date_of_birth,
            address: row.address,
            is_staff: row.is_staff,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row type for login lookups: the user plus their password hash.
#[derive(Debug, sqlx::FromRow)]
struct UserWithPasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Data for a new account. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a Email,
    pub username: &'a Username,
    pub password_hash: &'a str,
    pub is_staff: bool,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user and their password hash by email, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithPasswordRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    /// Get the password hash for a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(hash)
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new_user: NewUser<'_>) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, username, password_hash, is_staff) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new_user.email.as_str())
        .bind(new_user.username.as_str())
        .bind(new_user.password_hash)
        .bind(new_user.is_staff)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "user with this email already exists."))?;

        User::try_from(row)
    }

    /// Apply a partial profile update and return the updated user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        // Nullable columns use a "set" flag so that `Some(None)` clears them.
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                first_name = COALESCE($3, first_name), \
                last_name = COALESCE($4, last_name), \
                phone = CASE WHEN $5 THEN $6 ELSE phone END, \
                date_of_birth = CASE WHEN $7 THEN $8 ELSE date_of_birth END, \
                address = CASE WHEN $9 THEN $10 ELSE address END, \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(update.username.as_ref().map(Username::as_str))
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.phone.is_some())
        .bind(update.phone.clone().flatten())
        .bind(update.date_of_birth.is_some())
        .bind(update.date_of_birth.flatten())
        .bind(update.address.is_some())
        .bind(update.address.clone().flatten())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List users, newest first, optionally filtered by email or username.
    ///
    /// Returns the page of users and the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), RepositoryError> {
        let pattern = search.map(like_pattern);

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users \
             WHERE $1::text IS NULL OR email ILIKE $1 OR username ILIKE $1",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE $1::text IS NULL OR email ILIKE $1 OR username ILIKE $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((users, count))
    }

    /// Delete a user. Their cart, orders and tokens go with them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
