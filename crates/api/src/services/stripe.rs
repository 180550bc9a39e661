//! Stripe integration: payment intents and signed webhooks.
//!
//! Talks to the Stripe REST API directly over `reqwest` with form-encoded
//! requests. Webhook payloads are authenticated with the endpoint's signing
//! secret (`Stripe-Signature: t=...,v1=...`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

use cartwheel_core::{MoneyError, OrderId, to_minor_units};

use crate::config::StripeConfig;

type HmacSha256 = Hmac<Sha256>;

/// Currency all payments are taken in.
pub const CURRENCY: &str = "usd";

/// Maximum age of a webhook signature timestamp.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Stripe keys are not configured.
    #[error("payments are not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe returned an error response.
    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Webhook signature missing, malformed, stale or wrong.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook body could not be understood.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Order total cannot be charged.
    #[error("invalid amount: {0}")]
    Amount(#[from] MoneyError),
}

/// The parts of a payment intent the API needs.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// A webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

/// Event payload wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookObject,
}

/// The object an event is about. For `payment_intent.*` events, the intent.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl WebhookObject {
    /// The order this intent was created for, from its metadata.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata
            .get("order_id")
            .and_then(|v| v.parse::<i32>().ok())
            .map(OrderId::new)
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Client for the Stripe API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
    webhook_secret: SecretString,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_owned(),
                secret_key: config.secret_key.clone(),
                webhook_secret: config.webhook_secret.clone(),
            }),
        })
    }

    /// Create a payment intent for an order total.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Amount` if the total cannot be expressed in
    /// cents, `PaymentError::Http` on transport failure and
    /// `PaymentError::Api` if Stripe rejects the request.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn create_payment_intent(
        &self,
        order_id: OrderId,
        amount: Decimal,
    ) -> Result<PaymentIntent, PaymentError> {
        let cents = to_minor_units(amount)?;

        let form = [
            ("amount", cents.to_string()),
            ("currency", CURRENCY.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[order_id]", order_id.to_string()),
        ];

        let response = self
            .inner
            .client
            .post(format!("{}/v1/payment_intents", self.inner.api_base))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let intent = response.json::<PaymentIntent>().await?;
        debug!(intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }

    /// Verify a webhook signature and parse the event.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if the header is missing a
    /// matching `v1` signature or its timestamp is outside the tolerance,
    /// and `PaymentError::InvalidPayload` if the body is not an event.
    pub fn construct_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<WebhookEvent, PaymentError> {
        verify_signature(
            payload,
            signature_header,
            self.inner.webhook_secret.expose_secret(),
            now,
        )?;

        serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
    }
}

/// Check a `Stripe-Signature` header against the payload.
fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::InvalidSignature)?;
    let issued_at: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature)?;
    if now.abs_diff(issued_at) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(PaymentError::InvalidSignature);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Constant-time comparison against each candidate signature
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}
