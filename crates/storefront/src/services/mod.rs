//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Email and password accounts
//! - `auth_context` - Signed-in user and active role for one device
//! - `session_hub` - Device-scoped sign-in/sign-out events
//! - `storage` - Device-local key/value port
//! - `cart_store` - Cart persisted through device storage
//! - `otp` - Email and phone verification codes (`email`, `sms` deliver them)
//! - `settings` - Cached site settings

pub mod auth;
pub mod auth_context;
pub mod cart_store;
pub mod email;
pub mod otp;
pub mod session_hub;
pub mod settings;
pub mod sms;
pub mod storage;

pub use auth::{AuthError, AuthService};
pub use auth_context::{AuthContext, AuthSnapshot, PgRoleSource, RoleSource};
pub use cart_store::CartStore;
pub use session_hub::{HubSession, SessionHub, SessionSource};
pub use storage::{DeviceStorage, MemoryStorage, SessionStorage};
