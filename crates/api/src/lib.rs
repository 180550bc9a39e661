//! Cartwheel API library.
//!
//! The HTTP service for accounts, catalog, cart, orders and payments. Built
//! as a library so the router can be exercised in tests and the CLI can
//! reuse the repositories.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod state;
