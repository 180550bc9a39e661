//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; clients always receive a JSON body
//! of the form `{"error": "<message>"}` and never see internal details.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::orders::OrderError;
use crate::services::stripe::PaymentError;
use crate::services::tokens::TokenError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Account operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// JWT could not be issued or verified.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Payment provider operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and client-facing message for this error.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository_response(err),
            Self::Auth(err) => auth_response(err),
            Self::Token(err) => token_response(err),
            Self::Cart(err) => match err {
                CartError::ProductNotFound => (StatusCode::NOT_FOUND, err.to_string()),
                CartError::InvalidQuantity(_) | CartError::InsufficientStock { .. } => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CartError::Repository(inner) => repository_response(inner),
            },
            Self::Order(err) => match err {
                OrderError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                OrderError::EmptyCart
                | OrderError::InsufficientStock { .. }
                | OrderError::NotCancelable
                | OrderError::InvalidTransition { .. } => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                OrderError::Repository(inner) => repository_response(inner),
            },
            Self::Payment(err) => match err {
                PaymentError::NotConfigured => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Payments are not configured".to_string(),
                ),
                PaymentError::InvalidSignature | PaymentError::InvalidPayload(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                PaymentError::Http(_) | PaymentError::Api { .. } => (
                    StatusCode::BAD_GATEWAY,
                    "Payment provider error".to_string(),
                ),
                PaymentError::Amount(_) => internal(),
            },
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Internal(_) => internal(),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn repository_response(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found.".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => internal(),
    }
}

fn token_response(err: &TokenError) -> (StatusCode, String) {
    match err {
        TokenError::Encoding(_) => internal(),
        _ => (StatusCode::UNAUTHORIZED, err.to_string()),
    }
}

fn auth_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::Token(inner) => token_response(inner),
        AuthError::Repository(inner) => repository_response(inner),
        AuthError::PasswordHash => internal(),
        AuthError::InvalidEmail(_)
        | AuthError::InvalidUsername(_)
        | AuthError::InvalidProfile(_)
        | AuthError::UserAlreadyExists
        | AuthError::WeakPassword(_)
        | AuthError::PasswordMismatch
        | AuthError::IncorrectPassword
        | AuthError::InvalidResetToken
        | AuthError::NotTokenOwner => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for a business event.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = match axum::body::to_bytes(response.into_body(), 64 * 1024).await {
            Ok(bytes) => bytes,
            Err(e) => panic!("failed to read body: {e}"),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => panic!("body is not JSON: {e}"),
        }
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            get_status(RepositoryError::Conflict("taken".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(TokenError::Revoked.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(CartError::ProductNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(OrderError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(OrderError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(PaymentError::NotConfigured.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(PaymentError::InvalidSignature.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let body = body_json(OrderError::NotCancelable.into()).await;
        assert_eq!(body["error"], "Only pending order can be canceled");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = body_json(AppError::Internal("pool exhausted on db-3".to_string())).await;
        assert_eq!(body["error"], "Internal server error");

        let body = body_json(RepositoryError::DataCorruption("bad row".to_string()).into()).await;
        assert_eq!(body["error"], "Internal server error");
    }
}
