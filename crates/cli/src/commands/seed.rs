//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! categories:
//!   - name: Kitchen
//!     products:
//!       - name: Enamel Mug
//!         price: "12.50"
//!         stock: 40
//!         description: Speckled blue enamel, 350ml
//! ```
//!
//! Categories and products are matched by name: existing rows are updated,
//! missing ones created. Running the same file twice changes nothing.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use cartwheel_api::db::CatalogRepository;
use cartwheel_api::models::catalog::{NewProduct, ProductChanges};

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub categories: Vec<CategorySeed>,
}

#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub description: Option<String>,
}

/// Counts reported after seeding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories_created: usize,
    pub products_created: usize,
    pub products_updated: usize,
}

/// Check a seed file before touching the database.
///
/// Returns one message per problem; an empty list means the file is valid.
#[must_use]
pub fn validate(file: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut categories = HashSet::new();
    let mut products = HashSet::new();

    for category in &file.categories {
        if category.name.trim().is_empty() {
            errors.push("category with empty name".to_string());
        } else if !categories.insert(category.name.as_str()) {
            errors.push(format!("duplicate category: {}", category.name));
        }

        for product in &category.products {
            if product.name.trim().is_empty() {
                errors.push(format!("product with empty name in {}", category.name));
                continue;
            }
            if !products.insert(product.name.as_str()) {
                errors.push(format!("duplicate product: {}", product.name));
            }
            if product.price.is_sign_negative() && !product.price.is_zero() {
                errors.push(format!("{}: price cannot be negative", product.name));
            }
            if product.stock < 0 {
                errors.push(format!("{}: stock cannot be negative", product.name));
            }
        }
    }

    errors
}

/// Upsert the catalog described by `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails
/// validation, or a database operation fails.
pub async fn catalog(file_path: &str) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let file: CatalogFile = serde_yaml::from_str(&content)?;

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = super::connect().await?;
    let repo = CatalogRepository::new(&pool);
    let mut summary = SeedSummary::default();

    for seed in &file.categories {
        let category = match repo.get_category_by_name(&seed.name).await? {
            Some(existing) => existing,
            None => {
                summary.categories_created += 1;
                repo.create_category(&seed.name).await?
            }
        };

        for product in &seed.products {
            if let Some(existing) = repo.get_product_by_name(&product.name).await? {
                let changes = ProductChanges {
                    description: Some(product.description.clone()),
                    price: Some(product.price),
                    stock: Some(product.stock),
                    category_id: Some(category.id),
                    ..ProductChanges::default()
                };
                repo.update_product(existing.id, &changes).await?;
                summary.products_updated += 1;
            } else {
                repo.create_product(&NewProduct {
                    name: product.name.clone(),
                    slug: None,
                    description: product.description.clone(),
                    price: product.price,
                    image: None,
                    stock: product.stock,
                    category_id: category.id,
                })
                .await?;
                summary.products_created += 1;
            }
        }
    }

    info!("Seeding complete!");
    info!("  Categories created: {}", summary.categories_created);
    info!("  Products created: {}", summary.products_created);
    info!("  Products updated: {}", summary.products_updated);

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
categories:
  - name: Kitchen
    products:
      - name: Enamel Mug
        price: "12.50"
        stock: 40
        description: Speckled blue enamel
      - name: Tea Towel
        price: 6
  - name: Garden
"#;

    #[test]
    fn test_parse_sample() {
        let file: CatalogFile = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(file.categories.len(), 2);
        let kitchen = &file.categories[0];
        assert_eq!(kitchen.products[0].price, Decimal::new(1250, 2));
        assert_eq!(kitchen.products[1].stock, 0);
        assert!(kitchen.products[1].description.is_none());
        assert!(file.categories[1].products.is_empty());
        assert!(validate(&file).is_empty());
    }

    #[test]
    fn test_validate_reports_problems() {
        let file: CatalogFile = serde_yaml::from_str(
            r#"
categories:
  - name: Kitchen
    products:
      - {name: Mug, price: "-1.00", stock: 1}
      - {name: Mug, price: "2.00", stock: -3}
  - name: Kitchen
"#,
        )
        .unwrap();

        let errors = validate(&file);
        assert!(errors.contains(&"duplicate category: Kitchen".to_string()));
        assert!(errors.contains(&"duplicate product: Mug".to_string()));
        assert!(errors.contains(&"Mug: price cannot be negative".to_string()));
        assert!(errors.contains(&"Mug: stock cannot be negative".to_string()));
    }
}
