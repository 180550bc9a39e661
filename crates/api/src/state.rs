//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::stripe::PaymentError;
use crate::services::{EmailService, ProductListCache, StripeClient, TokenService};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stripe client: {0}")]
    Stripe(#[from] PaymentError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenService,
    product_cache: ProductListCache,
    stripe: Option<StripeClient>,
    email: Option<EmailService>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Optional integrations (Stripe, SMTP) are built only when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured integration cannot be initialized.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let tokens = TokenService::new(&config.tokens);
        let stripe = config.stripe.as_ref().map(StripeClient::new).transpose()?;
        let email = config.email.as_ref().map(EmailService::new).transpose()?;

        if stripe.is_none() {
            tracing::warn!("Stripe is not configured; payment endpoints will return 503");
        }
        if email.is_none() {
            tracing::warn!("SMTP is not configured; password reset emails will not be sent");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                product_cache: ProductListCache::new(),
                stripe,
                email,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the JWT service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get a reference to the product listing cache.
    #[must_use]
    pub fn product_cache(&self) -> &ProductListCache {
        &self.inner.product_cache
    }

    /// Get the Stripe client, if payments are configured.
    #[must_use]
    pub fn stripe(&self) -> Option<&StripeClient> {
        self.inner.stripe.as_ref()
    }

    /// Get the email service, if SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }
}
