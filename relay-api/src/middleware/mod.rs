//! Middleware modules for the relay API
//!
//! - `auth`: bearer token authentication
//! - `tenant`: tenant resolution filter
//! - `authority`: per-endpoint authority gate
//! - `csrf`: double-submit CSRF check
//!
//! # Middleware Order
//!
//! ```ignore
//! Router::new()
//!     .route("/messages/new", post(handler))
//!     // Route layers, innermost first: CSRF runs after the authority gate
//!     .route_layer(middleware::from_fn_with_state(csrf_state, csrf_middleware))
//!     .route_layer(middleware::from_fn(authority_middleware))
//!     // Global layers, innermost first
//!     .layer(middleware::from_fn_with_state(tenant_state, tenant_filter_middleware))
//!     .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
//! ```

mod auth;
mod authority;
mod csrf;
mod tenant;

pub use auth::{
    auth_middleware, extract_auth_context, AuthExtractor, AuthMiddlewareError,
    AuthMiddlewareState,
};
pub use authority::authority_middleware;
pub use csrf::{csrf_middleware, CsrfState};
pub use tenant::{tenant_filter_middleware, TenantFilterState};
