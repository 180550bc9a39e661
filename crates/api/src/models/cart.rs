//! Cart domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use cartwheel_core::{ProductId, line_total};

/// One product line in a user's cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub quantity: i32,
    pub subtotal: Decimal,
}

impl CartLine {
    /// Build a line, computing the subtotal from price and quantity.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        name: String,
        price: Decimal,
        image: Option<String>,
        quantity: i32,
    ) -> Self {
        Self {
            product_id,
            name,
            price,
            image,
            quantity,
            subtotal: line_total(price, quantity),
        }
    }
}

/// A user's cart as returned by `GET /api/cart`.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub total_price: Decimal,
    /// Number of distinct product lines.
    pub count: i64,
}

impl Cart {
    /// Summarise cart lines.
    #[must_use]
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let total_price = items
            .iter()
            .fold(Decimal::new(0, 2), |acc, line| acc + line.subtotal);
        let count = i64::try_from(items.len()).unwrap_or(i64::MAX);
        Self {
            items,
            total_price,
            count,
        }
    }
}
