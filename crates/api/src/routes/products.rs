//! Product catalog endpoints.
//!
//! Reads are public; writes require a staff token. Unsearched listings are
//! served through [`ProductListCache`](crate::services::ProductListCache),
//! which every write clears.

use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use cartwheel_core::{CategoryId, MAX_SLUG_LEN, ProductId, slugify};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::middleware::json::double_option;
use crate::middleware::{JsonBody, PathParam, RequireAdmin};
use crate::models::catalog::{NewProduct, ProductChanges, ProductResponse, ProductSummary};
use crate::pagination::{ListQuery, Page, PageRequest};
use crate::services::catalog_cache::CachedProductPage;
use crate::state::AppState;

/// Longest product or category name.
pub const MAX_NAME_LEN: usize = 150;

/// Largest price a `NUMERIC(10,2)` column holds.
const MAX_PRICE: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 0);

/// Product fields as sent by the client. Which are required depends on
/// the method: POST and PUT need `name`, `price` and `category`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub image: Option<Option<String>>,
    pub stock: Option<i32>,
    /// Category name.
    pub category: Option<String>,
}

impl ProductRequest {
    /// Strip surrounding whitespace from the name.
    fn trim_name(&mut self) {
        self.name = self.name.take().map(|name| name.trim().to_owned());
    }

    /// Check field values, and presence of required fields when `full`.
    fn validate(&self, full: bool) -> Result<()> {
        if full {
            for (field, present) in [
                ("name", self.name.is_some()),
                ("price", self.price.is_some()),
                ("category", self.category.is_some()),
            ] {
                if !present {
                    return Err(AppError::BadRequest(format!("{field}: This field is required.")));
                }
            }
        }

        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(slug) = &self.slug
            && (slug.is_empty() || slug.len() > MAX_SLUG_LEN || slugify(slug) != *slug)
        {
            return Err(AppError::BadRequest(
                "slug: Enter a valid slug of lowercase letters, numbers and hyphens.".to_string(),
            ));
        }
        if let Some(price) = self.price {
            if price.is_sign_negative() && !price.is_zero() {
                return Err(AppError::BadRequest(
                    "price: Ensure this value is greater than or equal to 0.".to_string(),
                ));
            }
            if price.normalize().scale() > 2 {
                return Err(AppError::BadRequest(
                    "price: Ensure that there are no more than 2 decimal places.".to_string(),
                ));
            }
            if price > MAX_PRICE {
                return Err(AppError::BadRequest(
                    "price: Ensure that there are no more than 10 digits in total.".to_string(),
                ));
            }
        }
        if self.stock.is_some_and(|s| s < 0) {
            return Err(AppError::BadRequest(
                "stock: Ensure this value is greater than or equal to 0.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check a catalog name: non-blank and at most [`MAX_NAME_LEN`] characters.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("name: This field may not be blank.".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "name: Ensure this field has no more than {MAX_NAME_LEN} characters."
        )));
    }
    Ok(())
}

async fn category_id(repo: &CatalogRepository<'_>, name: &str) -> Result<CategoryId> {
    repo.get_category_by_name(name)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| AppError::BadRequest(format!("category: Category \"{name}\" does not exist.")))
}

/// `GET /api/products`
#[instrument(skip_all, fields(search = ?query.search))]
pub async fn list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<ProductSummary>>> {
    let page = PageRequest::from_query(&query, state.config().page_size)?;
    let base_url = &state.config().base_url;
    let search = query.search();

    if search.is_none()
        && let Some(hit) = state.product_cache().get(page.page, page.page_size).await
    {
        let items = hit.items.as_ref().clone();
        return Ok(Json(Page::new(page, hit.count, items, base_url, &uri)?));
    }

    let ticket = state.product_cache().ticket();
    let (products, count) = CatalogRepository::new(state.pool())
        .list_products(search, page.limit(), page.offset())
        .await?;
    let items: Vec<ProductSummary> = products.into_iter().map(ProductSummary::from).collect();

    let response = Page::new(page, count, items, base_url, &uri)?;

    if search.is_none() {
        state
            .product_cache()
            .insert(
                ticket,
                page.page,
                page.page_size,
                CachedProductPage {
                    items: Arc::new(response.results.clone()),
                    count,
                },
            )
            .await;
    }

    Ok(Json(response))
}

/// `GET /api/products/{id}`
#[instrument(skip_all, fields(product_id = %id))]
pub async fn get(
    State(state): State<AppState>,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<ProductResponse>> {
    let product = CatalogRepository::new(state.pool())
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(Json(product.into()))
}

/// `POST /api/products` (admin)
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(mut req): JsonBody<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    req.trim_name();
    req.validate(true)?;

    let repo = CatalogRepository::new(state.pool());
    let category = req.category.as_deref().unwrap_or_default();
    let new = NewProduct {
        name: req.name.unwrap_or_default(),
        slug: req.slug,
        description: req.description.flatten(),
        price: req.price.unwrap_or_default(),
        image: req.image.flatten(),
        stock: req.stock.unwrap_or(0),
        category_id: category_id(&repo, category).await?,
    };

    let product = repo.create_product(&new).await?;
    state.product_cache().invalidate_all().await;

    tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// `PUT /api/products/{id}` (admin)
pub async fn replace(
    state: State<AppState>,
    admin: RequireAdmin,
    id: PathParam<ProductId>,
    JsonBody(mut req): JsonBody<ProductRequest>,
) -> Result<Json<ProductResponse>> {
    req.trim_name();
    req.validate(true)?;
    apply_update(state, admin, id, req).await
}

/// `PATCH /api/products/{id}` (admin)
pub async fn update(
    state: State<AppState>,
    admin: RequireAdmin,
    id: PathParam<ProductId>,
    JsonBody(mut req): JsonBody<ProductRequest>,
) -> Result<Json<ProductResponse>> {
    req.trim_name();
    req.validate(false)?;
    apply_update(state, admin, id, req).await
}

#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
async fn apply_update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<ProductId>,
    req: ProductRequest,
) -> Result<Json<ProductResponse>> {
    let repo = CatalogRepository::new(state.pool());

    let category_id = match req.category.as_deref() {
        Some(name) => Some(category_id(&repo, name).await?),
        None => None,
    };
    let changes = ProductChanges {
        name: req.name,
        slug: req.slug,
        description: req.description,
        price: req.price,
        image: req.image,
        stock: req.stock,
        category_id,
    };

    let product = repo.update_product(id, &changes).await?;
    state.product_cache().invalidate_all().await;

    tracing::info!("Product updated");
    Ok(Json(product.into()))
}

/// `DELETE /api/products/{id}` (admin)
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<ProductId>,
) -> Result<StatusCode> {
    CatalogRepository::new(state.pool()).delete_product(id).await?;
    state.product_cache().invalidate_all().await;

    tracing::info!("Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(json: &str) -> ProductRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_full_request_requires_fields() {
        let req = request(r#"{"name": "Mug", "price": "9.00"}"#);
        let err = req.validate(true).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.starts_with("category")));

        assert!(req.validate(false).is_ok());
    }

    #[test]
    fn test_price_accepts_string_or_number() {
        assert_eq!(request(r#"{"price": "12.50"}"#).price, Some(Decimal::new(1250, 2)));
        assert_eq!(request(r#"{"price": 3}"#).price, Some(Decimal::new(3, 0)));
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(request(r#"{"price": "-1.00"}"#).validate(false).is_err());
        assert!(request(r#"{"price": "0.00"}"#).validate(false).is_ok());
    }

    #[test]
    fn test_price_precision() {
        assert!(request(r#"{"price": "1.999"}"#).validate(false).is_err());
        assert!(request(r#"{"price": "1.500"}"#).validate(false).is_ok());
        assert!(request(r#"{"price": "100000000.00"}"#).validate(false).is_err());
    }

    #[test]
    fn test_negative_stock_rejected() {
        assert!(request(r#"{"stock": -1}"#).validate(false).is_err());
        assert!(request(r#"{"stock": 0}"#).validate(false).is_ok());
    }

    #[test]
    fn test_slug_must_be_canonical() {
        assert!(request(r#"{"slug": "red-mug"}"#).validate(false).is_ok());
        assert!(request(r#"{"slug": "Red Mug"}"#).validate(false).is_err());
        assert!(request(r#"{"slug": ""}"#).validate(false).is_err());
    }

    #[test]
    fn test_name_limits() {
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_name_is_trimmed() {
        let mut req = request(r#"{"name": "  Enamel Mug \n"}"#);
        req.trim_name();
        assert_eq!(req.name.as_deref(), Some("Enamel Mug"));

        let mut blank = request(r#"{"name": "   "}"#);
        blank.trim_name();
        assert!(blank.validate(false).is_err());
    }

    #[test]
    fn test_description_null_clears() {
        let req = request(r#"{"description": null}"#);
        assert_eq!(req.description, Some(None));
    }
}
