//! Payment repository.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use cartwheel_core::{OrderId, PaymentStatus};

use super::{RepositoryError, conflict_on_unique};
use crate::models::payment::Payment;

const PAYMENT_COLUMNS: &str =
    "id, order_id, stripe_payment_intent_id, amount, currency, status, created_at, updated_at";

/// Repository for payment database operations.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a new `pending` payment intent for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the intent is already recorded.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        order_id: OrderId,
        intent_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<Payment, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (order_id, stripe_payment_intent_id, amount, currency) \
             VALUES ($1, $2, $3, $4) RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(order_id)
        .bind(intent_id)
        .bind(amount)
        .bind(currency)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "payment intent already recorded."))?;

        Ok(payment)
    }

    /// Set the status of the payment for a Stripe intent.
    ///
    /// Returns the updated payment, or `None` if the intent is unknown.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_status(
        &self,
        intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        set_status_by_intent(&mut conn, intent_id, status).await
    }
}

/// Set the status of the payment for a Stripe intent.
///
/// Returns the updated payment, or `None` if the intent is unknown.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_status_by_intent(
    conn: &mut PgConnection,
    intent_id: &str,
    status: PaymentStatus,
) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "UPDATE payments SET status = $2, updated_at = NOW() \
         WHERE stripe_payment_intent_id = $1 RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(intent_id)
    .bind(status)
    .fetch_optional(conn)
    .await?;

    Ok(payment)
}
