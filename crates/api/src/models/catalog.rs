//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cartwheel_core::{CategoryId, ProductId};

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

/// A category together with the names of its products.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryDetail {
    pub id: CategoryId,
    pub name: String,
    pub products: Vec<String>,
}

/// A product, joined with its category name.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Unit price, two decimal places.
    pub price: Decimal,
    pub image: Option<String>,
    /// Units available for new orders.
    pub stock: i32,
    pub category_id: CategoryId,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact product shape used by listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub price: Decimal,
    pub image: Option<String>,
}

impl From<Product> for ProductSummary {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            slug: p.slug,
            category: p.category,
            price: p.price,
            image: p.image,
        }
    }
}

/// Full product representation.
#[derive(Debug, Clone, Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub stock: i32,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            slug: p.slug,
            description: p.description,
            price: p.price,
            image: p.image,
            stock: p.stock,
            category: p.category,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Validated input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    /// Explicit slug; derived from the name when `None`.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub stock: i32,
    pub category_id: CategoryId,
}

/// Changes to apply to an existing product. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    pub image: Option<Option<String>>,
    pub stock: Option<i32>,
    pub category_id: Option<CategoryId>,
}
