//! Order endpoints: checkout from the cart, history, cancellation and
//! admin status changes.

use axum::{
    Json,
    extract::{OriginalUri, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use cartwheel_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{JsonBody, PathParam, RequireAdmin, RequireAuth};
use crate::models::order::OrderResponse;
use crate::pagination::{ListQuery, Page, PageRequest};
use crate::services::OrderService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

impl UpdateStatusRequest {
    fn status(&self) -> Result<OrderStatus> {
        self.status.parse().map_err(|_| {
            AppError::BadRequest(format!("status: \"{}\" is not a valid choice.", self.status))
        })
    }
}

/// `GET /api/orders`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<OrderResponse>>> {
    let page = PageRequest::from_query(&query, state.config().page_size)?;
    let (orders, count) = OrderService::new(state.pool())
        .list_for_user(user.id, query.search(), page.limit(), page.offset())
        .await?;

    let results = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(Page::new(
        page,
        count,
        results,
        &state.config().base_url,
        &uri,
    )?))
}

/// `POST /api/orders`
///
/// Turns the caller's cart into a pending order.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    let order = OrderService::new(state.pool()).place(user.id).await?;

    let order_id = order.id.to_string();
    let total = order.total_price().to_string();
    add_breadcrumb(
        "orders",
        "Order placed",
        Some(&[("order_id", &order_id), ("total", &total)]),
    );
    tracing::info!(order_id = %order.id, total = %total, "Order placed");

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// `GET /api/orders/{id}`
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn get(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(id): PathParam<OrderId>,
) -> Result<Json<OrderResponse>> {
    let order = OrderService::new(state.pool())
        .get_for_user(user.id, id)
        .await?;
    Ok(Json(order.into()))
}

/// `PUT|PATCH /api/orders/{id}/cancel`
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(id): PathParam<OrderId>,
) -> Result<Json<Value>> {
    OrderService::new(state.pool()).cancel(user.id, id).await?;

    tracing::info!("Order canceled by customer");
    Ok(Json(json!({ "detail": "Your order has been canceled" })))
}

/// `PUT|PATCH /api/orders/{id}/status` (admin)
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<OrderId>,
    JsonBody(req): JsonBody<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>> {
    let status = req.status()?;
    let order = OrderService::new(state.pool())
        .update_status(id, status)
        .await?;
    Ok(Json(order.into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        let req = UpdateStatusRequest {
            status: "shipped".to_string(),
        };
        assert_eq!(req.status().unwrap(), OrderStatus::Shipped);

        let bad = UpdateStatusRequest {
            status: "lost".to_string(),
        };
        assert!(matches!(
            bad.status(),
            Err(AppError::BadRequest(msg)) if msg == "status: \"lost\" is not a valid choice."
        ));
    }
}
