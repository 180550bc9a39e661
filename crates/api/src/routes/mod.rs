//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness check
//! GET    /health/ready                    - Readiness check (database)
//!
//! # Auth (rate limited)
//! POST   /api/auth/register               - Create an account
//! POST   /api/auth/login                  - Email + password -> token pair
//! POST   /api/auth/token/refresh          - Refresh token -> access token
//! POST   /api/auth/logout                 - Revoke a refresh token
//! POST   /api/auth/password-reset         - Email a reset link
//! POST   /api/auth/password-reset/confirm - Set a new password with the token
//!
//! # Users
//! GET    /api/users/me                    - Own profile
//! PATCH  /api/users/me                    - Update own profile
//! POST   /api/users/me/password           - Change own password
//! GET    /api/users                       - List users (admin)
//! GET    /api/users/{id}                  - User detail (admin)
//! DELETE /api/users/{id}                  - Delete user (admin)
//!
//! # Catalog
//! GET    /api/products                    - Product listing (cached when unsearched)
//! POST   /api/products                    - Create product (admin)
//! GET    /api/products/{id}               - Product detail
//! PUT    /api/products/{id}               - Replace product (admin)
//! PATCH  /api/products/{id}               - Update product (admin)
//! DELETE /api/products/{id}               - Delete product (admin)
//! GET    /api/categories                  - Category listing
//! POST   /api/categories                  - Create category (admin)
//! GET    /api/categories/{id}             - Category with product names
//! PUT    /api/categories/{id}             - Rename category (admin)
//! DELETE /api/categories/{id}             - Delete category and its products (admin)
//!
//! # Cart
//! GET    /api/cart                        - View cart
//! DELETE /api/cart                        - Clear cart
//! POST   /api/cart/items                  - Add item
//! PUT    /api/cart/items/{product_id}     - Set quantity (0 removes)
//! DELETE /api/cart/items/{product_id}     - Remove item
//!
//! # Orders
//! GET    /api/orders                      - Own orders
//! POST   /api/orders                      - Place order from cart
//! GET    /api/orders/{id}                 - Own order detail
//! PUT    /api/orders/{id}/cancel          - Cancel own pending order (also PATCH)
//! PUT    /api/orders/{id}/status          - Change status (admin, also PATCH)
//!
//! # Payments
//! POST   /api/payments/intent             - Stripe payment intent for an order
//! POST   /api/payments/webhook            - Stripe webhook (signed)
//! ```

pub mod auth;
pub mod cart;
pub mod categories;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

use axum::{
    Router,
    body::Body,
    http::Request,
    middleware as axum_middleware,
    routing::{get, patch, post, put},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{auth_rate_limiter, request_id_middleware};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/token/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/password-reset", post(auth::request_password_reset))
        .route(
            "/password-reset/confirm",
            post(auth::confirm_password_reset),
        )
        .layer(auth_rate_limiter())
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list))
        .route("/me", get(users::me).patch(users::update_me))
        .route("/me/password", post(users::change_password))
        .route("/{id}", get(users::get).delete(users::delete))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route(
            "/{id}",
            get(products::get)
                .put(products::replace)
                .patch(products::update)
                .delete(products::delete),
        )
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::list).post(categories::create))
        .route(
            "/{id}",
            get(categories::get)
                .put(categories::update)
                .delete(categories::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{product_id}",
            put(cart::update_item).delete(cart::remove_item),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list).post(orders::create))
        .route("/{id}", get(orders::get))
        .route("/{id}/cancel", put(orders::cancel).patch(orders::cancel))
        .route(
            "/{id}/status",
            put(orders::update_status).patch(orders::update_status),
        )
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/intent", post(payments::create_intent))
        .route("/webhook", post(payments::webhook))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth_routes())
        .nest("/api/users", user_routes())
        .nest("/api/products", product_routes())
        .nest("/api/categories", category_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/payments", payment_routes())
}

/// Build the application: routes, state, tracing and request IDs.
///
/// Sentry layers are added by the binary around this.
pub fn app(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
            user_id = tracing::field::Empty,
        )
    });

    routes()
        .with_state(state)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use axum::http::{StatusCode, header};
    use chrono::Utc;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use cartwheel_core::{Email, UserId, Username};

    use super::*;
    use crate::config::{ApiConfig, StripeConfig, TokenConfig};
    use crate::models::User;
    use crate::services::TokenType;

    const WEBHOOK_SECRET: &str = "whsec_router_Hq4nV8tK2mZ6";

    fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://cartwheel@127.0.0.1:1/cartwheel"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8000,
            base_url: "http://localhost:8000".to_string(),
            tokens: TokenConfig {
                secret: SecretString::from("q8Z!vR2#kL9@wX4$mN7%pT1^sB6&yC3*"),
                access_ttl: Duration::from_secs(900),
                refresh_ttl: Duration::from_secs(604_800),
            },
            page_size: 10,
            stripe: None,
            email: None,
            sentry_dsn: None,
            log_format: crate::config::LogFormat::Pretty,
            sentry_environment: None,
        }
    }

    fn state_from(config: ApiConfig) -> AppState {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy("postgres://cartwheel@127.0.0.1:1/cartwheel")
            .unwrap();
        AppState::new(config, pool).unwrap()
    }

    fn test_state() -> AppState {
        state_from(test_config())
    }

    fn state_with_stripe() -> AppState {
        let mut config = test_config();
        config.stripe = Some(StripeConfig {
            secret_key: SecretString::from("sk_test_router"),
            webhook_secret: SecretString::from(WEBHOOK_SECRET),
            api_base: "http://127.0.0.1:1".to_string(),
        });
        state_from(config)
    }

    fn stripe_signature(payload: &[u8]) -> String {
        use hmac::{Hmac, Mac};

        let timestamp = Utc::now().timestamp();
        let mut mac = Hmac::<sha2::Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn user(is_staff: bool) -> User {
        User {
            id: UserId::new(7),
            email: Email::parse("shopper@example.com").unwrap(),
            username: Username::parse("shopper").unwrap(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            date_of_birth: None,
            address: None,
            is_staff,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(test_state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_readiness_without_database() {
        let response = app(test_state())
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (status, body) = send(
            test_state(),
            Request::builder().uri("/api/users/me").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let (status, _) = send(
            test_state(),
            Request::builder()
                .uri("/api/cart")
                .header(header::AUTHORIZATION, "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_token_rejected_as_access() {
        let state = test_state();
        let refresh = state.tokens().issue(&user(false), TokenType::Refresh).unwrap();

        let (status, _) = send(
            state,
            Request::builder()
                .uri("/api/orders")
                .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_staff_token_forbidden_on_admin_route() {
        let state = test_state();
        let access = state.tokens().issue(&user(false), TokenType::Access).unwrap();

        let (status, body) = send(
            state,
            Request::builder()
                .method("DELETE")
                .uri("/api/products/1")
                .header(header::AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["error"],
            "You do not have permission to perform this action."
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (status, body) = send(
            test_state(),
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::from("{\"email\": "))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_webhook_without_stripe_is_unavailable() {
        let (status, body) = send(
            test_state(),
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header("stripe-signature", "t=0,v1=00")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Payments are not configured");
    }

    #[tokio::test]
    async fn test_bad_page_is_rejected_before_query() {
        let (status, body) = send(
            test_state(),
            Request::builder()
                .uri("/api/products?page=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid page.");
    }

    #[tokio::test]
    async fn test_auth_rate_limit() {
        let app = app(test_state());
        let mut statuses = Vec::new();
        for _ in 0..6 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/auth/login")
                        .header(header::CONTENT_TYPE, "application/json")
                        .header("x-forwarded-for", "198.51.100.77")
                        .body(Body::from("not json"))
                        .unwrap(),
                )
                .await
                .unwrap();
            statuses.push(response.status());
        }

        assert!(statuses[..5].iter().all(|s| *s == StatusCode::BAD_REQUEST));
        assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_succeeded_event_without_order_is_acknowledged() {
        let payload = br#"{
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_orphan", "metadata": {}}}
        }"#;

        let (status, body) = send(
            state_with_stripe(),
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header("stripe-signature", stripe_signature(payload))
                .body(Body::from(&payload[..]))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
    }

    #[tokio::test]
    async fn test_webhook_with_extreme_timestamp_is_rejected() {
        let (status, body) = send(
            state_with_stripe(),
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header("stripe-signature", "t=-9223372036854775808,v1=00")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_cancel_rejects_post() {
        let (status, _) = send(
            test_state(),
            Request::builder()
                .method("POST")
                .uri("/api/orders/1/cancel")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_cancel_and_status_accept_put_and_patch() {
        for (method, uri) in [
            ("PUT", "/api/orders/1/cancel"),
            ("PATCH", "/api/orders/1/cancel"),
            ("PUT", "/api/orders/1/status"),
            ("PATCH", "/api/orders/1/status"),
        ] {
            let (status, _) = send(
                test_state(),
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

            // Routed, then stopped by the missing token
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_json_bad_request() {
        let (status, body) = send(
            test_state(),
            Request::builder()
                .uri("/api/products/abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
