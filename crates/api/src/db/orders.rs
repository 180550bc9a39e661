//! Order database operations.
//!
//! Writes take a `&mut PgConnection` so callers can compose them inside one
//! transaction; see `services::orders` for the transactional flows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use cartwheel_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::RepositoryError;
use super::cart::CART_TTL_DAYS;
use crate::models::order::{Order, OrderItem};

const ORDER_SELECT: &str = "SELECT o.id, o.user_id, u.email AS user_email, o.status, \
                            o.created_at, o.updated_at \
                            FROM orders o JOIN users u ON u.id = o.user_id";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    user_email: String,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product: String,
    product_id: ProductId,
    quantity: i32,
    price: Decimal,
}

/// A cart line with its product row locked for the order transaction.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedCartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub quantity: i32,
}

/// Status and owner of a locked order row.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct LockedOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
}

fn into_order(row: OrderRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let user_email = Email::parse(&row.user_email).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
    })?;

    Ok(Order {
        id: row.id,
        user_id: row.user_id,
        user_email,
        status: row.status,
        items,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Load items for a set of orders, grouped by order in input order.
async fn load_items(
    conn: &mut PgConnection,
    order_ids: &[OrderId],
) -> Result<Vec<OrderItemRow>, RepositoryError> {
    let ids: Vec<i32> = order_ids.iter().map(|id| id.as_i32()).collect();

    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT oi.id, oi.order_id, p.name AS product, oi.product_id, oi.quantity, oi.price \
         FROM order_items oi JOIN products p ON p.id = oi.product_id \
         WHERE oi.order_id = ANY($1) \
         ORDER BY oi.order_id, oi.id",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

fn attach_items(rows: Vec<OrderRow>, items: Vec<OrderItemRow>) -> Result<Vec<Order>, RepositoryError> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let own: Vec<OrderItem> = items
            .iter()
            .filter(|item| item.order_id == row.id)
            .map(|item| OrderItem {
                id: item.id,
                product: item.product.clone(),
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            })
            .collect();
        orders.push(into_order(row, own)?);
    }
    Ok(orders)
}

/// Get an order with its items.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items = load_items(conn, &[row.id]).await?;
    Ok(attach_items(vec![row], items)?.pop())
}

/// List a user's orders newest first, optionally filtered by a status substring.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn list_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    status_search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Order>, i64), RepositoryError> {
    let pattern = status_search.map(super::like_pattern);

    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM orders \
         WHERE user_id = $1 AND ($2::text IS NULL OR status::text ILIKE $2)",
    )
    .bind(user_id)
    .bind(pattern.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "{ORDER_SELECT} \
         WHERE o.user_id = $1 AND ($2::text IS NULL OR o.status::text ILIKE $2) \
         ORDER BY o.created_at DESC, o.id DESC LIMIT $3 OFFSET $4"
    ))
    .bind(user_id)
    .bind(pattern.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
    let items = load_items(conn, &ids).await?;

    Ok((attach_items(rows, items)?, count))
}

/// Read the user's live cart lines and lock their products `FOR UPDATE`,
/// in product id order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_cart_lines(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<LockedCartLine>, RepositoryError> {
    let lines = sqlx::query_as::<_, LockedCartLine>(
        "SELECT p.id AS product_id, p.name, p.price, p.stock, ci.quantity \
         FROM cart_items ci JOIN products p ON p.id = ci.product_id \
         WHERE ci.user_id = $1 AND ci.updated_at >= NOW() - make_interval(days => $2) \
         ORDER BY p.id \
         FOR UPDATE OF p",
    )
    .bind(user_id)
    .bind(CART_TTL_DAYS)
    .fetch_all(conn)
    .await?;

    Ok(lines)
}

/// Insert a new `pending` order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_order(conn: &mut PgConnection, user_id: UserId) -> Result<OrderId, RepositoryError> {
    let id = sqlx::query_scalar::<_, OrderId>(
        "INSERT INTO orders (user_id, status) VALUES ($1, 'pending') RETURNING id",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Insert an order line at the given unit price.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    price: Decimal,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO order_items (order_id, product_id, quantity, price) VALUES ($1, $2, $3, $4)",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(price)
    .execute(conn)
    .await?;

    Ok(())
}

/// Add `delta` (possibly negative) to a product's stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails, including when
/// the result would be negative (check constraint).
pub async fn adjust_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    delta: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
        .bind(product_id)
        .bind(delta)
        .execute(conn)
        .await?;

    Ok(())
}

/// Lock an order row `FOR UPDATE`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<LockedOrder>, RepositoryError> {
    let order = sqlx::query_as::<_, LockedOrder>(
        "SELECT id, user_id, status FROM orders WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(order)
}

/// Product quantities of an order, in product id order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn item_quantities(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
    let rows = sqlx::query_as::<_, (ProductId, i32)>(
        "SELECT product_id, quantity FROM order_items WHERE order_id = $1 ORDER BY product_id",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Set an order's status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(conn)
        .await?;

    Ok(())
}
