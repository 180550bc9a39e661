//! Category endpoints. Reads are public; writes require a staff token.

use axum::{
    Json,
    extract::{OriginalUri, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use cartwheel_core::CategoryId;

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::middleware::{JsonBody, PathParam, RequireAdmin};
use crate::models::Category;
use crate::models::catalog::CategoryDetail;
use crate::pagination::{ListQuery, Page, PageRequest};
use crate::routes::products::validate_name;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

/// `GET /api/categories`
#[instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Category>>> {
    let page = PageRequest::from_query(&query, state.config().page_size)?;
    let (categories, count) = CatalogRepository::new(state.pool())
        .list_categories(query.search(), page.limit(), page.offset())
        .await?;

    Ok(Json(Page::new(
        page,
        count,
        categories,
        &state.config().base_url,
        &uri,
    )?))
}

/// `GET /api/categories/{id}`
#[instrument(skip_all, fields(category_id = %id))]
pub async fn get(
    State(state): State<AppState>,
    PathParam(id): PathParam<CategoryId>,
) -> Result<Json<CategoryDetail>> {
    let repo = CatalogRepository::new(state.pool());
    let category = repo
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
    let products = repo.category_product_names(id).await?;

    Ok(Json(CategoryDetail {
        id: category.id,
        name: category.name,
        products,
    }))
}

/// `POST /api/categories` (admin)
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    validate_name(&req.name)?;
    let category = CatalogRepository::new(state.pool())
        .create_category(req.name.trim())
        .await?;

    tracing::info!(category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// `PUT /api/categories/{id}` (admin)
///
/// Product listings embed the category name, so the product cache is cleared.
#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<CategoryId>,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> Result<Json<Category>> {
    validate_name(&req.name)?;
    let category = CatalogRepository::new(state.pool())
        .rename_category(id, req.name.trim())
        .await?;
    state.product_cache().invalidate_all().await;

    Ok(Json(category))
}

/// `DELETE /api/categories/{id}` (admin)
///
/// Deletes the category's products too.
#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<CategoryId>,
) -> Result<StatusCode> {
    CatalogRepository::new(state.pool()).delete_category(id).await?;
    state.product_cache().invalidate_all().await;

    tracing::info!("Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
