//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, new hub per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Maintenance gate
//! 7. Rate limiting (governor) on auth, verification and cart routes
//!
//! Role checks are extractors in [`guard`], not layers.

pub mod guard;
pub mod maintenance;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use guard::{
    AdminOnly, AnyRole, CustomerOnly, RequireRole, RoleContext, RolePolicy, VendorOnly,
};
pub use maintenance::maintenance_middleware;
pub use rate_limit::{auth_rate_limiter, cart_rate_limiter, verification_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
