//! Cart service: stock-checked mutations of a user's cart.

use sqlx::PgPool;
use thiserror::Error;

use cartwheel_core::{ProductId, UserId};

use crate::db::{CartRepository, CatalogRepository, RepositoryError};
use crate::models::cart::Cart;
use crate::models::catalog::Product;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity out of range for the operation.
    #[error("{0}")]
    InvalidQuantity(String),

    /// No product with the given ID.
    #[error("Product not found")]
    ProductNotFound,

    /// Requested quantity exceeds stock.
    #[error("Only {available} units available")]
    InsufficientStock { available: i32 },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart service.
pub struct CartService<'a> {
    cart: CartRepository<'a>,
    catalog: CatalogRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            cart: CartRepository::new(pool),
            catalog: CatalogRepository::new(pool),
        }
    }

    /// The user's cart, after dropping expired lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn view(&self, user_id: UserId) -> Result<Cart, CartError> {
        self.cart.purge_expired(user_id).await?;
        let lines = self.cart.lines(user_id).await?;
        Ok(Cart::from_lines(lines))
    }

    /// Add `quantity` units of a product, on top of what is already there.
    ///
    /// Returns the product that was added.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for `quantity < 1`,
    /// `CartError::ProductNotFound` for an unknown product and
    /// `CartError::InsufficientStock` if the new line would exceed stock.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Product, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let product = self.product(product_id).await?;
        self.cart.purge_expired(user_id).await?;

        let existing = self.cart.quantity_of(user_id, product_id).await?.unwrap_or(0);
        let total = existing
            .checked_add(quantity)
            .ok_or_else(|| CartError::InvalidQuantity("Quantity is too large".to_string()))?;
        ensure_stock(&product, total)?;

        self.cart.set_quantity(user_id, product_id, total).await?;
        Ok(product)
    }

    /// Set the quantity of a line; `0` removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for negative quantities,
    /// `CartError::ProductNotFound` for an unknown product and
    /// `CartError::InsufficientStock` if `quantity` exceeds stock.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), CartError> {
        if quantity < 0 {
            return Err(CartError::InvalidQuantity(
                "Quantity cannot be negative".to_string(),
            ));
        }

        let product = self.product(product_id).await?;

        if quantity == 0 {
            self.cart.remove(user_id, product_id).await?;
            return Ok(());
        }

        ensure_stock(&product, quantity)?;
        self.cart.set_quantity(user_id, product_id, quantity).await?;
        Ok(())
    }

    /// Remove a line. Removing a product that is not in the cart succeeds.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), CartError> {
        self.cart.remove(user_id, product_id).await?;
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), CartError> {
        self.cart.clear(user_id).await?;
        Ok(())
    }

    async fn product(&self, product_id: ProductId) -> Result<Product, CartError> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)
    }
}

fn ensure_stock(product: &Product, wanted: i32) -> Result<(), CartError> {
    if wanted > product.stock {
        return Err(CartError::InsufficientStock {
            available: product.stock,
        });
    }
    Ok(())
}
