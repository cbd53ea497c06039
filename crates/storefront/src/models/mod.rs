//! Domain models for the web tier.

pub mod session;
pub mod settings;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
pub use settings::SiteSettings;
pub use user::{Profile, User};
