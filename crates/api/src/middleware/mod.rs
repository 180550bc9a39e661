//! HTTP middleware and extractors for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Rate limiting on `/api/auth` (governor)

pub mod auth;
pub mod json;
pub mod path;
pub mod rate_limit;
pub mod request_id;

pub use auth::{RequireAdmin, RequireAuth};
pub use json::JsonBody;
pub use path::PathParam;
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
