//! Session middleware configuration.
//!
//! The session is the visitor's device storage: it holds the signed-in
//! user, the device id, the cart payload and the active-role preference.

use sqlx::PgPool;
use tower_sessions::cookie::{SameSite, time::Duration};
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "mandir_session";

/// Sessions expire after 7 days of inactivity.
const SESSION_INACTIVITY_DAYS: i64 = 7;

/// Create the session layer with `PostgreSQL` store.
///
/// The `tower_sessions.session` table is created by the migrations.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_INACTIVITY_DAYS)))
        .with_secure(config.uses_https())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
