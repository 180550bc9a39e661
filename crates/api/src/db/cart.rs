//! Cart repository. One implicit cart per user, a row per product line.
//!
//! Lines untouched for [`CART_TTL_DAYS`] days are considered expired; they
//! are ignored by reads and purged on access.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use cartwheel_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::CartLine;

/// Days a cart line lives without being touched.
pub const CART_TTL_DAYS: i32 = 7;

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    name: String,
    price: Decimal,
    image: Option<String>,
    quantity: i32,
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Delete the user's expired cart lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM cart_items \
             WHERE user_id = $1 AND updated_at < NOW() - make_interval(days => $2)",
        )
        .bind(user_id)
        .bind(CART_TTL_DAYS)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// The user's live cart lines, in product order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT ci.product_id, p.name, p.price, p.image, ci.quantity \
             FROM cart_items ci JOIN products p ON p.id = ci.product_id \
             WHERE ci.user_id = $1 AND ci.updated_at >= NOW() - make_interval(days => $2) \
             ORDER BY ci.product_id",
        )
        .bind(user_id)
        .bind(CART_TTL_DAYS)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CartLine::new(r.product_id, r.name, r.price, r.image, r.quantity))
            .collect())
    }

    /// Quantity of a product currently in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM cart_items \
             WHERE user_id = $1 AND product_id = $2 \
               AND updated_at >= NOW() - make_interval(days => $3)",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(CART_TTL_DAYS)
        .fetch_optional(self.pool)
        .await?;

        Ok(quantity)
    }

    /// Set the quantity of a line, creating it if needed. Refreshes its expiry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) \
             DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove a line. Removing a missing line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Empty the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear_in(&mut *conn, user_id).await
    }
}

/// Empty the user's cart on an existing connection or transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear_in(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;

    Ok(())
}
