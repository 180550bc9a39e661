//! Catalog repository: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use cartwheel_core::{CategoryId, MAX_SLUG_LEN, ProductId, numbered_slug, slugify};

use super::{RepositoryError, conflict_on_unique, like_pattern};
use crate::models::catalog::{Category, NewProduct, Product, ProductChanges};

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.slug, p.description, p.price, p.image, \
                              p.stock, p.category_id, c.name AS category, p.created_at, \
                              p.updated_at \
                              FROM products p JOIN categories c ON c.id = p.category_id";

/// Upper bound on numbered slug attempts before giving up.
const MAX_SLUG_ATTEMPTS: u32 = 1000;

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: Option<String>,
    price: Decimal,
    image: Option<String>,
    stock: i32,
    category_id: CategoryId,
    category: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            image: row.image,
            stock: row.stock,
            category_id: row.category_id,
            category: row.category,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for catalog database operations.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// List categories by name, optionally filtered by a name substring.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Category>, i64), RepositoryError> {
        let pattern = search.map(like_pattern);

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM categories WHERE $1::text IS NULL OR name ILIKE $1",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at, updated_at FROM categories \
             WHERE $1::text IS NULL OR name ILIKE $1 \
             ORDER BY name, id LIMIT $2 OFFSET $3",
        )
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Category::from).collect(), count))
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Get a category by its exact name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at, updated_at FROM categories WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Names of the products in a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn category_product_names(
        &self,
        id: CategoryId,
    ) -> Result<Vec<String>, RepositoryError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM products WHERE category_id = $1 ORDER BY name",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(names)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_category(&self, name: &str) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (name) VALUES ($1) \
             RETURNING id, name, created_at, updated_at",
        )
        .bind(name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "category with this name already exists."))?;

        Ok(row.into())
    }

    /// Rename a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn rename_category(
        &self,
        id: CategoryId,
        name: &str,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "UPDATE categories SET name = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING id, name, created_at, updated_at",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "category with this name already exists."))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a category and, by cascade, its products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// List products newest first, optionally filtered by product or
    /// category name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let pattern = search.map(like_pattern);

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products p JOIN categories c ON c.id = p.category_id \
             WHERE $1::text IS NULL OR p.name ILIKE $1 OR c.name ILIKE $1",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{PRODUCT_SELECT} \
             WHERE $1::text IS NULL OR p.name ILIKE $1 OR c.name ILIKE $1 \
             ORDER BY p.created_at DESC, p.id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Product::from).collect(), count))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// Get a product by its exact name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.name = $1"))
            .bind(name)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// Create a product, deriving a free slug from the name when none is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or explicit slug is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_product(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let slug = match &new.slug {
            Some(slug) => slug.clone(),
            None => self.free_slug(&new.name, None).await?,
        };

        let id = sqlx::query_scalar::<_, ProductId>(
            "INSERT INTO products (name, slug, description, price, image, stock, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&new.name)
        .bind(&slug)
        .bind(new.description.as_deref())
        .bind(new.price)
        .bind(new.image.as_deref())
        .bind(new.stock)
        .bind(new.category_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product with this name or slug already exists."))?;

        self.get_product(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Apply changes to a product.
    ///
    /// A rename without an explicit slug re-derives the slug from the new name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new name or slug is taken.
    pub async fn update_product(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError> {
        let slug = match (&changes.slug, &changes.name) {
            (Some(slug), _) => Some(slug.clone()),
            (None, Some(name)) => Some(self.free_slug(name, Some(id)).await?),
            (None, None) => None,
        };

        let updated = sqlx::query_scalar::<_, ProductId>(
            "UPDATE products SET \
                name = COALESCE($2, name), \
                slug = COALESCE($3, slug), \
                description = CASE WHEN $4 THEN $5 ELSE description END, \
                price = COALESCE($6, price), \
                image = CASE WHEN $7 THEN $8 ELSE image END, \
                stock = COALESCE($9, stock), \
                category_id = COALESCE($10, category_id), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(slug.as_deref())
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .bind(changes.price)
        .bind(changes.image.is_some())
        .bind(changes.image.clone().flatten())
        .bind(changes.stock)
        .bind(changes.category_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product with this name or slug already exists."))?
        .ok_or(RepositoryError::NotFound)?;

        self.get_product(updated).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Find the first unused slug derived from `name`: `base`, `base-2`, ...
    ///
    /// `exclude` is a product whose own slug does not count as taken.
    async fn free_slug(
        &self,
        name: &str,
        exclude: Option<ProductId>,
    ) -> Result<String, RepositoryError> {
        let mut base = slugify(name);
        if base.is_empty() {
            base = "product".to_owned();
        }

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let candidate = numbered_slug(&base, attempt, MAX_SLUG_LEN);
            let taken = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM products \
                 WHERE slug = $1 AND ($2::int IS NULL OR id <> $2))",
            )
            .bind(&candidate)
            .bind(exclude)
            .fetch_one(self.pool)
            .await?;

            if !taken {
                return Ok(candidate);
            }
        }

        Err(RepositoryError::Conflict(format!(
            "could not find a free slug for '{name}'"
        )))
    }
}
