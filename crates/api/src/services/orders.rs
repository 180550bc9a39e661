//! Order service: transactional order placement, cancellation and status
//! changes.
//!
//! Every flow runs in a single transaction. Product rows are locked in id
//! order so concurrent orders touching the same products cannot deadlock.

use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};

use cartwheel_core::{OrderId, OrderStatus, PaymentStatus, UserId};

use crate::db::{self, RepositoryError};
use crate::models::order::Order;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart has no live lines.
    #[error("Your Cart is Empty")]
    EmptyCart,

    /// A product has fewer units than the cart asks for.
    #[error("Not enough stock for product {product}, Only {available} left")]
    InsufficientStock { product: String, available: i32 },

    /// No such order, or it belongs to someone else.
    #[error("Order not found")]
    NotFound,

    /// Only pending orders can be cancelled by their owner.
    #[error("Only pending order can be canceled")]
    NotCancelable,

    /// The requested status change is not allowed.
    #[error("Cannot change status from {from} to {to}. Allowed: {}", format_allowed(.from))]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

fn format_allowed(from: &OrderStatus) -> String {
    let allowed = from.allowed_transitions();
    if allowed.is_empty() {
        return "none".to_string();
    }
    allowed
        .iter()
        .map(|status| status.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// What a successful payment did to its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSettlement {
    /// The order moved from `pending` to `paid`.
    MarkedPaid,
    /// The order was already `paid`.
    AlreadyPaid,
    /// The order is in a status a payment cannot move; left unchanged.
    Unchanged(OrderStatus),
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's orders, optionally filtered by a status substring.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        status_search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, i64), OrderError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::orders::list_for_user(&mut conn, user_id, status_search, limit, offset).await?)
    }

    /// Get one of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist or belongs
    /// to another user.
    pub async fn get_for_user(&self, user_id: UserId, id: OrderId) -> Result<Order, OrderError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::get(&mut conn, id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(OrderError::NotFound)
    }

    /// Turn the user's cart into a `pending` order.
    ///
    /// Locks the cart's products, checks stock, snapshots current prices,
    /// decrements stock and clears the cart. Nothing changes on failure.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart` if the cart is empty and
    /// `OrderError::InsufficientStock` if any product is short.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn place(&self, user_id: UserId) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let lines = db::orders::lock_cart_lines(&mut tx, user_id).await?;
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        if let Some(short) = lines.iter().find(|line| line.stock < line.quantity) {
            return Err(OrderError::InsufficientStock {
                product: short.name.clone(),
                available: short.stock,
            });
        }

        let order_id = db::orders::insert_order(&mut tx, user_id).await?;
        for line in &lines {
            db::orders::insert_item(&mut tx, order_id, line.product_id, line.quantity, line.price)
                .await?;
            db::orders::adjust_stock(&mut tx, line.product_id, -line.quantity).await?;
        }
        db::cart::clear_in(&mut tx, user_id).await?;

        let order = load(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_id = %order_id, items = lines.len(), "Order placed");
        Ok(order)
    }

    /// Cancel one of the user's pending orders and restore its stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for missing or foreign orders and
    /// `OrderError::NotCancelable` unless the order is `pending`.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %id))]
    pub async fn cancel(&self, user_id: UserId, id: OrderId) -> Result<(), OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = db::orders::lock_order(&mut tx, id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(OrderError::NotFound)?;

        if order.status != OrderStatus::Pending {
            return Err(OrderError::NotCancelable);
        }

        restore_stock(&mut tx, id).await?;
        db::orders::set_status(&mut tx, id, OrderStatus::Canceled).await?;
        tx.commit().await?;

        info!("Order canceled by owner");
        Ok(())
    }

    /// Move an order to a new status (admin).
    ///
    /// Cancelling restores the order's stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist and
    /// `OrderError::InvalidTransition` if the change is not allowed.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = db::orders::lock_order(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if !order.status.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }

        if status == OrderStatus::Canceled {
            restore_stock(&mut tx, id).await?;
        }
        db::orders::set_status(&mut tx, id, status).await?;

        let updated = load(&mut tx, id).await?;
        tx.commit().await?;

        info!(from = %order.status, "Order status changed");
        Ok(updated)
    }

    /// Record a successful payment and mark its order paid.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn settle_payment(
        &self,
        intent_id: &str,
        order_id: OrderId,
    ) -> Result<PaymentSettlement, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = db::orders::lock_order(&mut tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if db::payments::set_status_by_intent(&mut tx, intent_id, PaymentStatus::Succeeded)
            .await?
            .is_none()
        {
            tracing::warn!(intent_id, "Succeeded intent has no payment record");
        }

        let settlement = match order.status {
            OrderStatus::Pending => {
                db::orders::set_status(&mut tx, order_id, OrderStatus::Paid).await?;
                PaymentSettlement::MarkedPaid
            }
            OrderStatus::Paid => PaymentSettlement::AlreadyPaid,
            other => PaymentSettlement::Unchanged(other),
        };

        tx.commit().await?;
        Ok(settlement)
    }
}

/// Add every item's quantity back to its product, in product id order.
async fn restore_stock(conn: &mut PgConnection, id: OrderId) -> Result<(), OrderError> {
    for (product_id, quantity) in db::orders::item_quantities(conn, id).await? {
        db::orders::adjust_stock(conn, product_id, quantity).await?;
    }
    Ok(())
}

async fn load(conn: &mut PgConnection, id: OrderId) -> Result<Order, OrderError> {
    db::orders::get(conn, id).await?.ok_or(OrderError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_lists_allowed() {
        let err = OrderError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        };
        assert_eq!(
            err.to_string(),
            "Cannot change status from pending to delivered. Allowed: paid, canceled"
        );
    }

    #[test]
    fn test_invalid_transition_from_terminal() {
        let err = OrderError::InvalidTransition {
            from: OrderStatus::Canceled,
            to: OrderStatus::Paid,
        };
        assert!(err.to_string().ends_with("Allowed: none"));
    }

    #[test]
    fn test_insufficient_stock_message() {
        let err = OrderError::InsufficientStock {
            product: "Mug".to_string(),
            available: 2,
        };
        assert_eq!(err.to_string(), "Not enough stock for product Mug, Only 2 left");
    }
}
