//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, password changes and resets
//! - `tokens` - JWT issue and verification
//! - `cart` - Stock-checked cart mutations
//! - `orders` - Transactional order placement, cancellation and status changes
//! - `stripe` - Stripe payment intents and webhook verification
//! - `email` - Email delivery via SMTP
//! - `catalog_cache` - In-memory cache for product listings

pub mod auth;
pub mod cart;
pub mod catalog_cache;
pub mod email;
pub mod orders;
pub mod stripe;
pub mod tokens;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use catalog_cache::ProductListCache;
pub use email::{EmailError, EmailService};
pub use orders::{OrderError, OrderService};
pub use stripe::{PaymentError, StripeClient};
pub use tokens::{Claims, TokenError, TokenPair, TokenService, TokenType};
