//! Cart and checkout flow against a running server.

use cartwheel_integration_tests::{
    add_to_cart, admin, client, create_product, new_customer, send, stock_of, url,
};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_cart_totals() {
    let client = client();
    let admin = admin(&client).await;
    let customer = new_customer(&client).await;
    let mug = create_product(&client, &admin, "12.50", 10).await;
    let lamp = create_product(&client, &admin, "30.00", 10).await;
    let mug_id = mug["id"].as_i64().expect("mug id");
    let lamp_id = lamp["id"].as_i64().expect("lamp id");

    add_to_cart(&client, &customer, mug_id, 2).await;
    add_to_cart(&client, &customer, mug_id, 1).await;
    add_to_cart(&client, &customer, lamp_id, 1).await;

    let (status, cart) = send(customer.auth(client.get(url("/api/cart")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["count"], 2);
    assert_eq!(cart["total_price"], "67.50");
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(2));

    let (status, cart) = send(
        customer
            .auth(client.put(url(&format!("/api/cart/items/{mug_id}"))))
            .json(&json!({ "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_price"], "42.50");

    let (status, _) = send(customer.auth(client.delete(url(&format!("/api/cart/items/{lamp_id}"))))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, cart) = send(customer.auth(client.get(url("/api/cart")))).await;
    assert_eq!(cart["count"], 1);
    assert_eq!(cart["total_price"], "12.50");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_cart_rejects_more_than_stock() {
    let client = client();
    let admin = admin(&client).await;
    let customer = new_customer(&client).await;
    let product = create_product(&client, &admin, "8.00", 3).await;
    let id = product["id"].as_i64().expect("product id");

    add_to_cart(&client, &customer, id, 2).await;

    let (status, body) = send(
        customer
            .auth(client.post(url("/api/cart/items")))
            .json(&json!({ "product_id": id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only 3 units available");

    let (status, _) = send(
        customer
            .auth(client.post(url("/api/cart/items")))
            .json(&json!({ "product_id": 2_000_000_000, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_place_order() {
    let client = client();
    let admin = admin(&client).await;
    let customer = new_customer(&client).await;
    let product = create_product(&client, &admin, "19.90", 5).await;
    let id = product["id"].as_i64().expect("product id");

    add_to_cart(&client, &customer, id, 2).await;

    let (status, order) = send(customer.auth(client.post(url("/api/orders")))).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_price"], "39.80");
    assert_eq!(order["user"], customer.email.as_str());
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(order["items"][0]["price"], "19.90");

    assert_eq!(stock_of(&client, id).await, 3);

    let (_, cart) = send(customer.auth(client.get(url("/api/cart")))).await;
    assert_eq!(cart["count"], 0);

    let (status, orders) = send(customer.auth(client.get(url("/api/orders")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders["count"], 1);
    assert_eq!(orders["results"][0]["id"], order["id"]);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_empty_cart_cannot_be_ordered() {
    let client = client();
    let customer = new_customer(&client).await;

    let (status, body) = send(customer.auth(client.post(url("/api/orders")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Your Cart is Empty");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_order_fails_when_stock_ran_out() {
    let client = client();
    let admin = admin(&client).await;
    let first = new_customer(&client).await;
    let second = new_customer(&client).await;
    let product = create_product(&client, &admin, "4.00", 2).await;
    let id = product["id"].as_i64().expect("product id");

    add_to_cart(&client, &first, id, 2).await;
    add_to_cart(&client, &second, id, 2).await;

    let (status, _) = send(first.auth(client.post(url("/api/orders")))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(second.auth(client.post(url("/api/orders")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|m| m.ends_with("Only 0 left")));
    assert_eq!(stock_of(&client, id).await, 0);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_orders_are_private() {
    let client = client();
    let admin = admin(&client).await;
    let owner = new_customer(&client).await;
    let stranger = new_customer(&client).await;
    let product = create_product(&client, &admin, "1.00", 1).await;
    let id = product["id"].as_i64().expect("product id");

    add_to_cart(&client, &owner, id, 1).await;
    let (_, order) = send(owner.auth(client.post(url("/api/orders")))).await;
    let order_id = order["id"].as_i64().expect("order id");

    let (status, _) = send(stranger.auth(client.get(url(&format!("/api/orders/{order_id}"))))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(stranger.auth(client.post(url(&format!("/api/orders/{order_id}/cancel"))))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(owner.auth(client.get(url(&format!("/api/orders/{order_id}"))))).await;
    assert_eq!(status, StatusCode::OK);
}
