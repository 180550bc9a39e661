//! Domain models and their JSON response shapes.
//!
//! Domain types are validated values built from database rows; response
//! types are what handlers serialize.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod payment;
pub mod user;

pub use cart::{Cart, CartLine};
pub use catalog::{Category, Product};
pub use order::{Order, OrderItem};
pub use payment::Payment;
pub use user::User;
