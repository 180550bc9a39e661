//! Cart endpoints. Every route acts on the caller's own cart.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use cartwheel_core::ProductId;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{JsonBody, PathParam, RequireAuth};
use crate::models::Cart;
use crate::services::CartService;
use crate::state::AppState;

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

/// `GET /api/cart`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>> {
    let cart = CartService::new(state.pool()).view(user.id).await?;
    Ok(Json(cart))
}

/// `DELETE /api/cart`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<StatusCode> {
    CartService::new(state.pool()).clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/cart/items`
#[instrument(skip_all, fields(user_id = %user.id, product_id = %req.product_id, quantity = req.quantity))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let product = CartService::new(state.pool())
        .add(user.id, req.product_id, req.quantity)
        .await?;

    let product_id = product.id.to_string();
    add_breadcrumb("cart", "Item added", Some(&[("product_id", &product_id)]));

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("{} added to cart", product.name) })),
    ))
}

/// `PUT /api/cart/items/{product_id}`
///
/// A quantity of zero removes the line. Responds with the updated cart.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id, quantity = req.quantity))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(product_id): PathParam<ProductId>,
    JsonBody(req): JsonBody<UpdateItemRequest>,
) -> Result<Json<Cart>> {
    let service = CartService::new(state.pool());
    service
        .set_quantity(user.id, product_id, req.quantity)
        .await?;

    Ok(Json(service.view(user.id).await?))
}

/// `DELETE /api/cart/items/{product_id}`
#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(product_id): PathParam<ProductId>,
) -> Result<StatusCode> {
    CartService::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_quantity_defaults_to_one() {
        let req: AddItemRequest = serde_json::from_str(r#"{"product_id": 4}"#).unwrap();
        assert_eq!(req.product_id, ProductId::new(4));
        assert_eq!(req.quantity, 1);
    }

    #[test]
    fn test_add_item_requires_product() {
        assert!(serde_json::from_str::<AddItemRequest>(r#"{"quantity": 2}"#).is_err());
    }
}
