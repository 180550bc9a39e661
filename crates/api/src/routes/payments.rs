//! Stripe payment endpoints.
//!
//! The client asks for a payment intent for one of its pending orders and
//! confirms it with Stripe directly; Stripe then reports the outcome to the
//! webhook, which moves the order to `paid`.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use cartwheel_core::{OrderId, OrderStatus, PaymentStatus};

use crate::db::PaymentRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{JsonBody, RequireAuth};
use crate::services::orders::PaymentSettlement;
use crate::services::stripe::{CURRENCY, WebhookEvent};
use crate::services::{OrderError, OrderService, PaymentError};
use crate::state::AppState;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub order_id: OrderId,
}

/// `POST /api/payments/intent`
#[instrument(skip_all, fields(user_id = %user.id, order_id = %req.order_id))]
pub async fn create_intent(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(req): JsonBody<CreateIntentRequest>,
) -> Result<Json<Value>> {
    let stripe = state.stripe().ok_or(PaymentError::NotConfigured)?;

    let order = OrderService::new(state.pool())
        .get_for_user(user.id, req.order_id)
        .await?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::BadRequest(
            "Only pending orders can be paid".to_string(),
        ));
    }

    let amount = order.total_price();
    let intent = stripe.create_payment_intent(order.id, amount).await?;

    PaymentRepository::new(state.pool())
        .create(order.id, &intent.id, amount, CURRENCY)
        .await?;

    info!(intent_id = %intent.id, amount = %amount, "Payment intent created");
    Ok(Json(json!({ "client_secret": intent.client_secret })))
}

/// `POST /api/payments/webhook`
///
/// Unhandled event types are acknowledged and ignored.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let stripe = state.stripe().ok_or(PaymentError::NotConfigured)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::InvalidSignature)?;

    let event = stripe.construct_event(&body, signature, chrono::Utc::now().timestamp())?;
    handle_event(&state, &event).await?;

    Ok(Json(json!({ "received": true })))
}

#[instrument(skip_all, fields(event_type = %event.event_type, intent_id = %event.data.object.id))]
async fn handle_event(state: &AppState, event: &WebhookEvent) -> Result<()> {
    let intent = &event.data.object;

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let Some(order_id) = intent.order_id() else {
                // Acknowledge so Stripe stops retrying an event we cannot act on
                warn!("Payment succeeded without order_id metadata");
                return Ok(());
            };

            let settlement = OrderService::new(state.pool())
                .settle_payment(&intent.id, order_id)
                .await
                .map_err(|e| match e {
                    OrderError::NotFound => AppError::BadRequest("Order not found".to_string()),
                    other => other.into(),
                })?;

            match settlement {
                PaymentSettlement::MarkedPaid => {
                    let order_id = order_id.to_string();
                    add_breadcrumb("payments", "Order paid", Some(&[("order_id", &order_id)]));
                    info!(order_id = %order_id, "Order marked paid");
                }
                PaymentSettlement::AlreadyPaid => {
                    debug!(order_id = %order_id, "Order already paid");
                }
                PaymentSettlement::Unchanged(status) => {
                    warn!(order_id = %order_id, status = %status, "Payment succeeded for order that cannot be paid");
                }
            }
        }
        "payment_intent.payment_failed" => {
            record_status(state, &intent.id, PaymentStatus::Failed).await?;
        }
        "payment_intent.canceled" => {
            record_status(state, &intent.id, PaymentStatus::Canceled).await?;
        }
        other => debug!(event_type = other, "Ignoring webhook event"),
    }

    Ok(())
}

async fn record_status(state: &AppState, intent_id: &str, status: PaymentStatus) -> Result<()> {
    let updated = PaymentRepository::new(state.pool())
        .set_status(intent_id, status)
        .await?;

    if updated.is_none() {
        warn!(intent_id, status = %status, "Webhook for unknown payment intent");
    } else {
        info!(intent_id, status = %status, "Payment status updated");
    }
    Ok(())
}
