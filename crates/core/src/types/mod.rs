//! Core types for Cartwheel.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod slug;
pub mod status;
pub mod username;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{MoneyError, line_total, to_minor_units};
pub use slug::{MAX_SLUG_LEN, numbered_slug, slugify};
pub use status::*;
pub use username::{Username, UsernameError};
