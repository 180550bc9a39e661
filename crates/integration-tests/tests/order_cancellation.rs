//! Order cancellation and admin status changes against a running server.

use cartwheel_integration_tests::{
    Session, add_to_cart, admin, client, create_product, new_customer, send, stock_of, url,
};
use reqwest::{Client, StatusCode};
use serde_json::json;

/// Place a one-line order and return `(order_id, product_id)`.
async fn place_order(client: &Client, admin: &Session, customer: &Session, quantity: i32) -> (i64, i64) {
    let product = create_product(client, admin, "10.00", 5).await;
    let product_id = product["id"].as_i64().expect("product id");
    add_to_cart(client, customer, product_id, quantity).await;

    let (status, order) = send(customer.auth(client.post(url("/api/orders")))).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    (order["id"].as_i64().expect("order id"), product_id)
}

async fn set_status(client: &Client, admin: &Session, order_id: i64, status: &str) -> (StatusCode, serde_json::Value) {
    send(
        admin
            .auth(client.patch(url(&format!("/api/orders/{order_id}/status"))))
            .json(&json!({ "status": status })),
    )
    .await
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_cancel_restores_stock() {
    let client = client();
    let admin = admin(&client).await;
    let customer = new_customer(&client).await;
    let (order_id, product_id) = place_order(&client, &admin, &customer, 3).await;
    assert_eq!(stock_of(&client, product_id).await, 2);

    let cancel = url(&format!("/api/orders/{order_id}/cancel"));
    let (status, _) = send(customer.auth(client.post(&cancel))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, body) = send(customer.auth(client.put(&cancel))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Your order has been canceled");
    assert_eq!(stock_of(&client, product_id).await, 5);

    let (status, body) = send(customer.auth(client.patch(&cancel))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only pending order can be canceled");
    assert_eq!(stock_of(&client, product_id).await, 5);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_status_lifecycle() {
    let client = client();
    let admin = admin(&client).await;
    let customer = new_customer(&client).await;
    let (order_id, _) = place_order(&client, &admin, &customer, 1).await;

    let (status, body) = set_status(&client, &admin, order_id, "lost").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "status: \"lost\" is not a valid choice.");

    let (status, body) = set_status(&client, &admin, order_id, "delivered").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Cannot change status from pending to delivered. Allowed: paid, canceled"
    );

    for next in ["paid", "shipped", "delivered"] {
        let (status, body) = set_status(&client, &admin, order_id, next).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], next);
    }

    let (status, _) = set_status(&client, &admin, order_id, "canceled").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(customer.auth(client.put(url(&format!("/api/orders/{order_id}/cancel"))))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_admin_cancel_restores_stock() {
    let client = client();
    let admin = admin(&client).await;
    let customer = new_customer(&client).await;
    let (order_id, product_id) = place_order(&client, &admin, &customer, 2).await;

    let (status, _) = set_status(&client, &admin, order_id, "paid").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = set_status(&client, &admin, order_id, "canceled").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "canceled");
    assert_eq!(stock_of(&client, product_id).await, 5);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_customer_cannot_change_status() {
    let client = client();
    let admin = admin(&client).await;
    let customer = new_customer(&client).await;
    let (order_id, _) = place_order(&client, &admin, &customer, 1).await;

    let (status, _) = set_status(&client, &customer, order_id, "paid").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
