//! Payment domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use cartwheel_core::{OrderId, PaymentId, PaymentStatus};

/// A Stripe payment intent recorded against an order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub stripe_payment_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
