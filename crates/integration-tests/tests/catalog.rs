//! Catalog administration and browsing against a running server.

use cartwheel_integration_tests::{
    admin, client, create_category, create_product, new_customer, send, unique_name, url,
};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_admin_creates_product() {
    let client = client();
    let admin = admin(&client).await;

    let product = create_product(&client, &admin, "19.90", 7).await;
    assert_eq!(product["price"], "19.90");
    assert_eq!(product["stock"], 7);
    assert!(product["slug"].as_str().is_some_and(|s| s.starts_with("product-")));

    let id = product["id"].as_i64().expect("product id");
    let (status, body) = send(client.get(url(&format!("/api/products/{id}")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], product["name"]);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_search_finds_product() {
    let client = client();
    let admin = admin(&client).await;
    let product = create_product(&client, &admin, "5.00", 1).await;
    let name = product["name"].as_str().expect("name");
    let term = name.split(' ').next_back().expect("suffix");

    let (status, body) = send(
        client
            .get(url("/api/products"))
            .query(&[("search", term.to_uppercase())]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], product["id"]);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_listing_is_paginated() {
    let client = client();

    let (status, body) = send(client.get(url("/api/products")).query(&[("page_size", "1")])).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["count"].is_i64());
    assert!(body["results"].as_array().is_some_and(|r| r.len() <= 1));
    assert!(body["previous"].is_null());

    let (status, body) = send(client.get(url("/api/products")).query(&[("page", "99999")])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid page.");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_customer_cannot_manage_catalog() {
    let client = client();
    let customer = new_customer(&client).await;

    let (status, _) = send(
        customer
            .auth(client.post(url("/api/categories")))
            .json(&json!({ "name": unique_name("Nope") })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(customer.auth(client.post(url("/api/products"))).json(&json!({
        "name": unique_name("Nope"),
        "price": "1.00",
        "category": "Anything",
    })))
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_product_validation() {
    let client = client();
    let admin = admin(&client).await;
    let category = unique_name("Category");
    create_category(&client, &admin, &category).await;

    let (status, _) = send(admin.auth(client.post(url("/api/products"))).json(&json!({
        "name": unique_name("Cheap"),
        "price": "-1.00",
        "category": category,
    })))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(admin.auth(client.post(url("/api/products"))).json(&json!({
        "name": unique_name("Orphan"),
        "price": "1.00",
        "category": unique_name("Missing"),
    })))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(admin.auth(client.post(url("/api/products"))).json(&json!({
        "price": "1.00",
        "category": category,
    })))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_colliding_slugs_are_numbered() {
    let client = client();
    let admin = admin(&client).await;
    let category = unique_name("Category");
    create_category(&client, &admin, &category).await;
    let base = unique_name("Blue Mug");

    let mut slugs = Vec::new();
    for name in [base.clone(), format!("{base}!"), format!("{base}?")] {
        let (status, body) = send(admin.auth(client.post(url("/api/products"))).json(&json!({
            "name": name,
            "price": "9.00",
            "category": category,
        })))
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        slugs.push(body["slug"].as_str().expect("slug").to_string());
    }

    let expected = slugs.first().expect("first slug").clone();
    assert_eq!(slugs, vec![expected.clone(), format!("{expected}-2"), format!("{expected}-3")]);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_long_colliding_names_fit_slug_column() {
    let client = client();
    let admin = admin(&client).await;
    let category = unique_name("Category");
    create_category(&client, &admin, &category).await;

    // 150 characters, differing only in case so they share a slug base
    let stem = unique_name("Long").replace(' ', "-");
    let name = format!("{stem}{}", "a".repeat(150 - stem.len()));

    let mut slugs = Vec::new();
    for name in [name.clone(), name.to_uppercase()] {
        let (status, body) = send(admin.auth(client.post(url("/api/products"))).json(&json!({
            "name": name,
            "price": "1.00",
            "category": category,
        })))
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        slugs.push(body["slug"].as_str().expect("slug").to_string());
    }

    assert!(slugs.iter().all(|slug| slug.len() == 150), "{slugs:?}");
    assert!(slugs.last().is_some_and(|slug| slug.ends_with("-2")));
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_patch_updates_listing() {
    let client = client();
    let admin = admin(&client).await;
    let product = create_product(&client, &admin, "3.00", 2).await;
    let id = product["id"].as_i64().expect("product id");

    // Prime the listing cache, then make sure the write is visible.
    send(client.get(url("/api/products"))).await;

    let (status, body) = send(
        admin
            .auth(client.patch(url(&format!("/api/products/{id}"))))
            .json(&json!({ "price": "4.50" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], "4.50");
    assert_eq!(body["stock"], 2);

    let term = product["name"].as_str().expect("name").to_string();
    let (_, body) = send(client.get(url("/api/products")).query(&[("search", term)])).await;
    assert_eq!(body["results"][0]["price"], "4.50");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_category_detail_and_cascade_delete() {
    let client = client();
    let admin = admin(&client).await;
    let category = unique_name("Category");
    let category_id = create_category(&client, &admin, &category).await;

    let product_name = unique_name("Lamp");
    let (status, product) = send(admin.auth(client.post(url("/api/products"))).json(&json!({
        "name": product_name,
        "price": "25.00",
        "stock": 3,
        "category": category,
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = product["id"].as_i64().expect("product id");

    let (status, body) = send(client.get(url(&format!("/api/categories/{category_id}")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"], json!([product_name]));

    let (status, _) = send(admin.auth(client.delete(url(&format!("/api/categories/{category_id}"))))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(client.get(url(&format!("/api/products/{product_id}")))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_duplicate_category_rejected() {
    let client = client();
    let admin = admin(&client).await;
    let name = unique_name("Category");
    create_category(&client, &admin, &name).await;

    let (status, body) = send(
        admin
            .auth(client.post(url("/api/categories")))
            .json(&json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "category with this name already exists.");
}
