//! Mandir Bazaar storefront library.
//!
//! The web tier of the marketplace: sign-in and roles, role homes, the
//! session cart, contact verification and admin-managed site settings.
//! Exposed as a library so the binary and the integration tests share one
//! router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::path::Path;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the full application router.
///
/// Static files are served from `static_dir`. Layers run outermost first:
/// trace, request id, security headers, session, maintenance gate.
pub fn app(state: AppState, static_dir: &Path) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::maintenance_middleware,
        ))
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Span for one HTTP request.
///
/// `request_id`, `status` and `latency_ms` are filled in later by the
/// request-id middleware and the trace layer.
fn request_span<B>(request: &axum::http::Request<B>) -> Span {
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = tracing::field::Empty,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    )
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[test]
    fn test_request_span_declares_request_id() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let request = Request::get("/cart").body(()).unwrap();
            let span = request_span(&request);
            let fields = span.metadata().unwrap().fields();
            for name in ["request_id", "status", "latency_ms"] {
                assert!(fields.field(name).is_some(), "missing {name}");
            }
        });
    }
}
