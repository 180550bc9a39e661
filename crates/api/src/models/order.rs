//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use cartwheel_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId, UserId, line_total};

/// An order with its line items.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Email of the ordering user.
    pub user_email: Email,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order, priced at the time the order was placed.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    /// Product name.
    pub product: String,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Unit price snapshot.
    pub price: Decimal,
}

impl Order {
    /// Sum of `price * quantity` over all items.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items
            .iter()
            .fold(Decimal::new(0, 2), |acc, item| {
                acc + line_total(item.price, item.quantity)
            })
    }
}

/// Public representation of an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    /// Email of the ordering user.
    pub user: String,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let total_price = order.total_price();
        Self {
            id: order.id,
            user: order.user_email.into_inner(),
            items: order.items,
            status: order.status,
            total_price,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i32, price: i64, quantity: i32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(id),
            product: format!("product-{id}"),
            product_id: ProductId::new(id),
            quantity,
            price: Decimal::new(price, 2),
        }
    }

    #[test]
    fn test_total_price_sums_items() {
        let order = Order {
            id: OrderId::new(1),
            user_id: UserId::new(1),
            user_email: Email::parse("buyer@example.com").unwrap_or_else(|e| panic!("{e}")),
            status: OrderStatus::Pending,
            items: vec![item(1, 1000, 3), item(2, 250, 2)],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(order.total_price(), Decimal::new(3500, 2));

        let response = OrderResponse::from(order);
        assert_eq!(response.user, "buyer@example.com");
        assert_eq!(response.total_price.to_string(), "35.00");
    }
}
