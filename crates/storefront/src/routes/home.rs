//! Home page route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tracing::instrument;

use mandir_core::guard::LOGIN_PATH;

use super::Chrome;
use crate::db::ProductRepository;
use crate::db::products::StockSnapshot;
use crate::error::Result;
use crate::filters;
use crate::middleware::RoleContext;
use crate::state::AppState;

/// Products shown on the home page.
const FEATURED_LIMIT: i64 = 12;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub chrome: Chrome,
    pub products: Vec<StockSnapshot>,
}

/// Display the home page.
#[instrument(skip(state, auth))]
pub async fn home(State(state): State<AppState>, auth: RoleContext) -> Result<impl IntoResponse> {
    let products = ProductRepository::new(state.pool())
        .list_active(FEATURED_LIMIT)
        .await?;

    Ok(HomeTemplate {
        chrome: Chrome::new(&state, "", Some(&auth)).await,
        products,
    })
}

/// Send the visitor to their active role's home, or to sign in.
#[instrument(skip(auth))]
pub async fn role_home(auth: RoleContext) -> Response {
    let target = auth
        .snapshot
        .active_role()
        .map_or(LOGIN_PATH, mandir_core::Role::home_path);
    Redirect::to(target).into_response()
}
