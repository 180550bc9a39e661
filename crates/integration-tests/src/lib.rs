//! End-to-end tests for the Cartwheel API.
//!
//! The tests talk HTTP to a running server and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p cartwheel-cli -- migrate
//! CW_ADMIN_PASSWORD=... cargo run -p cartwheel-cli -- users create-admin -e admin@example.com -u admin
//! cargo run -p cartwheel-api &
//!
//! CW_ADMIN_EMAIL=admin@example.com CW_ADMIN_PASSWORD=... \
//!     cargo test -p cartwheel-integration-tests -- --ignored --test-threads=1
//! ```
//!
//! # Environment Variables
//!
//! - `API_BASE_URL` - Server under test (default: `http://localhost:8000`)
//! - `CW_ADMIN_EMAIL` / `CW_ADMIN_PASSWORD` - Existing staff account

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password used for every account the tests register.
pub const TEST_PASSWORD: &str = "Tr0ub4dor&3-horse";

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn api_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// Absolute URL for an API path.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", api_base_url().trim_end_matches('/'))
}

/// A fresh HTTP client.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .build()
        .expect("Failed to create HTTP client")
}

/// An email address no other test run uses.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// A name no other test run uses.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("{prefix} {suffix}")
}

/// Tokens for a signed-in account.
#[derive(Debug, Clone)]
pub struct Session {
    pub email: String,
    pub access: String,
    pub refresh: String,
}

impl Session {
    /// Attach the access token to a request.
    #[must_use]
    pub fn auth(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access)
    }
}

/// A random private-range client address.
///
/// Auth endpoints are rate limited per client IP, taken from
/// `X-Forwarded-For`; giving each request its own address keeps the suite
/// under the limit.
#[must_use]
pub fn random_client_ip() -> String {
    let [a, b, c, ..] = Uuid::new_v4().into_bytes();
    format!("10.{a}.{b}.{c}")
}

/// Send a request and decode its JSON body (`Null` for empty bodies).
pub async fn send(request: RequestBuilder) -> (StatusCode, Value) {
    let response: Response = request
        .header("x-forwarded-for", random_client_ip())
        .send()
        .await
        .expect("Request failed");
    let status = response.status();
    let text = response.text().await.expect("Failed to read body");
    let body = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, body)
}

/// Log in and return the session.
pub async fn login(client: &Client, email: &str, password: &str) -> Session {
    let (status, body) = send(
        client
            .post(url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");

    Session {
        email: email.to_string(),
        access: body["token"]["access"]
            .as_str()
            .expect("access token")
            .to_string(),
        refresh: body["token"]["refresh"]
            .as_str()
            .expect("refresh token")
            .to_string(),
    }
}

/// Register a new customer account and log in.
pub async fn new_customer(client: &Client) -> Session {
    let email = unique_email("shopper");
    let (status, body) = send(client.post(url("/api/auth/register")).json(&json!({
        "email": email,
        "username": "shopper",
        "password": TEST_PASSWORD,
        "password2": TEST_PASSWORD,
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

    login(client, &email, TEST_PASSWORD).await
}

/// Log in as the staff account from `CW_ADMIN_EMAIL` / `CW_ADMIN_PASSWORD`.
pub async fn admin(client: &Client) -> Session {
    let email = std::env::var("CW_ADMIN_EMAIL").expect("CW_ADMIN_EMAIL not set");
    let password = std::env::var("CW_ADMIN_PASSWORD").expect("CW_ADMIN_PASSWORD not set");
    login(client, &email, &password).await
}

/// Create a category and return its ID.
pub async fn create_category(client: &Client, admin: &Session, name: &str) -> i64 {
    let (status, body) = send(
        admin.auth(client.post(url("/api/categories")))
            .json(&json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create category failed: {body}");
    body["id"].as_i64().expect("category id")
}

/// Create a product in a fresh category and return its JSON.
pub async fn create_product(client: &Client, admin: &Session, price: &str, stock: i32) -> Value {
    let category = unique_name("Category");
    create_category(client, admin, &category).await;

    let (status, body) = send(admin.auth(client.post(url("/api/products"))).json(&json!({
        "name": unique_name("Product"),
        "price": price,
        "stock": stock,
        "category": category,
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED, "create product failed: {body}");
    body
}

/// Current stock of a product.
pub async fn stock_of(client: &Client, product_id: i64) -> i64 {
    let (status, body) = send(client.get(url(&format!("/api/products/{product_id}")))).await;
    assert_eq!(status, StatusCode::OK);
    body["stock"].as_i64().expect("stock")
}

/// Add a product to the session's cart.
pub async fn add_to_cart(client: &Client, session: &Session, product_id: i64, quantity: i32) {
    let (status, body) = send(
        session
            .auth(client.post(url("/api/cart/items")))
            .json(&json!({ "product_id": product_id, "quantity": quantity })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "add to cart failed: {body}");
}
