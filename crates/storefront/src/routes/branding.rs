//! Branding stylesheet.

use axum::{
    extract::State,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::IntoResponse,
};

use crate::state::AppState;

/// Serve the CSS custom properties derived from site settings.
///
/// Kept short-lived to match the settings cache.
pub async fn stylesheet(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.settings().current().await;
    (
        [
            (CONTENT_TYPE, "text/css; charset=utf-8"),
            (CACHE_CONTROL, "public, max-age=60"),
        ],
        settings.css_variables(),
    )
}
