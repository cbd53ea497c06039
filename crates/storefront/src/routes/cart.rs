//! Cart route handlers.
//!
//! The cart lives in the visitor's session as a versioned payload. Mutations
//! answer with HTML fragments; side effects (badge refresh, drawer, toasts)
//! ride along in the `HX-Trigger` header.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_sessions::Session;
use tracing::instrument;

use mandir_core::cart::{AddOutcome, Cart, CartLine, LineKey, UpdateOutcome};
use mandir_core::{ProductId, VariantId};

use super::Chrome;
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RoleContext;
use crate::services::{CartStore, SessionStorage};
use crate::state::AppState;

const HX_TRIGGER: HeaderName = HeaderName::from_static("hx-trigger");

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: i32,
    pub variant_id: Option<i32>,
    pub title: String,
    pub variant_title: Option<String>,
    pub quantity: u32,
    pub max_quantity: u32,
    pub price: String,
    pub line_price: String,
}

impl From<&CartLine> for CartItemView {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.as_i32(),
            variant_id: line.variant_id.map(|v| v.as_i32()),
            title: line.title.clone(),
            variant_title: line.variant_title.clone(),
            quantity: line.quantity,
            max_quantity: line.stock_ceiling,
            price: line.unit_price.to_string(),
            line_price: line.line_total().to_string(),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines().iter().map(CartItemView::from).collect(),
            subtotal: cart.total_price().to_string(),
            item_count: cart.item_count(),
        }
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Update cart form data.
///
/// Zero or a negative quantity removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i32,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i32,
    #[serde(default)]
    pub variant_id: Option<String>,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub chrome: Chrome,
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Toast severity understood by the client script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Warning,
}

/// Events sent to the page in `HX-Trigger`.
#[derive(Debug, Default)]
pub struct Triggers {
    cart_updated: bool,
    drawer_open: bool,
    toast: Option<(ToastLevel, String)>,
}

impl Triggers {
    fn updated() -> Self {
        Self {
            cart_updated: true,
            ..Self::default()
        }
    }

    fn toast(mut self, level: ToastLevel, message: impl Into<String>) -> Self {
        self.toast = Some((level, message.into()));
        self
    }

    /// Triggers for an add attempt.
    #[must_use]
    pub fn for_add(outcome: AddOutcome) -> Self {
        match outcome {
            AddOutcome::Added { .. } => Self {
                cart_updated: true,
                drawer_open: outcome.opens_drawer(),
                toast: None,
            },
            AddOutcome::Rejected {
                in_cart: 0,
                available,
                ..
            } => Self::default().toast(
                ToastLevel::Warning,
                format!("Only {available} in stock."),
            ),
            AddOutcome::Rejected {
                in_cart, available, ..
            } => Self::default().toast(
                ToastLevel::Warning,
                format!("Only {available} in stock and {in_cart} already in your cart."),
            ),
            AddOutcome::InvalidQuantity => {
                Self::default().toast(ToastLevel::Warning, "Quantity must be at least 1.")
            }
        }
    }

    /// Triggers for a quantity update.
    #[must_use]
    pub fn for_update(outcome: UpdateOutcome) -> Self {
        match outcome {
            UpdateOutcome::Set { .. } => Self::updated(),
            UpdateOutcome::Removed => {
                Self::updated().toast(ToastLevel::Info, "Item removed from your cart.")
            }
            UpdateOutcome::Clamped { to, .. } => Self::updated().toast(
                ToastLevel::Warning,
                format!("Only {to} in stock. Quantity set to {to}."),
            ),
            UpdateOutcome::Missing => Self::default()
                .toast(ToastLevel::Info, "That item is no longer in your cart."),
        }
    }

    /// The `HX-Trigger` value, or `None` when there is nothing to send.
    #[must_use]
    pub fn header_value(&self) -> Option<HeaderValue> {
        let mut events = Map::new();
        if self.cart_updated {
            events.insert("cart-updated".to_owned(), Value::Bool(true));
        }
        if self.drawer_open {
            events.insert("cart-drawer-open".to_owned(), Value::Bool(true));
        }
        if let Some((level, message)) = &self.toast {
            events.insert(
                "toast".to_owned(),
                serde_json::json!({ "level": level, "message": message }),
            );
        }
        if events.is_empty() {
            return None;
        }
        HeaderValue::from_str(&Value::Object(events).to_string()).ok()
    }

    fn apply(&self, body: impl IntoResponse) -> Response {
        let mut response = body.into_response();
        if let Some(value) = self.header_value() {
            response.headers_mut().insert(HX_TRIGGER, value);
        }
        response
    }
}

/// Parse an optional variant field; blank means "no variant".
fn parse_variant(raw: Option<&str>) -> Result<Option<VariantId>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<i32>()
            .map(|id| Some(VariantId::new(id)))
            .map_err(|_| AppError::BadRequest("invalid variant".to_owned())),
    }
}

fn line_key(product_id: i32, variant_id: Option<&str>) -> Result<LineKey> {
    Ok(LineKey {
        product_id: ProductId::new(product_id),
        variant_id: parse_variant(variant_id)?,
    })
}

async fn load_cart(session: Session) -> Result<CartStore<SessionStorage>> {
    Ok(CartStore::load(SessionStorage::new(session)).await?)
}

/// Display cart page.
#[instrument(skip(state, auth, session))]
pub async fn show(
    State(state): State<AppState>,
    auth: RoleContext,
    session: Session,
) -> Result<impl IntoResponse> {
    let store = load_cart(session).await?;
    Ok(CartShowTemplate {
        chrome: Chrome::new(&state, "Cart", Some(&auth)).await,
        cart: CartView::from(store.cart()),
    })
}

/// Add item to cart (HTMX).
///
/// The stock ceiling, price and vendor come from the current catalog row,
/// not from the form.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let key = line_key(form.product_id, form.variant_id.as_deref())?;
    let mut store = load_cart(session).await?;

    let Some(snapshot) = ProductRepository::new(state.pool())
        .stock_snapshot(key.product_id, key.variant_id)
        .await?
    else {
        tracing::debug!(product_id = %key.product_id, "add for unknown or inactive product");
        let triggers =
            Triggers::default().toast(ToastLevel::Warning, "This item is no longer available.");
        return Ok(triggers.apply(CartCountTemplate {
            count: store.cart().item_count(),
        }));
    };

    let outcome = store.add(snapshot.into_line(form.quantity)).await?;
    tracing::debug!(?outcome, "cart add");

    Ok(Triggers::for_add(outcome).apply(CartCountTemplate {
        count: store.cart().item_count(),
    }))
}

/// Update cart item quantity (HTMX).
#[instrument(skip(session))]
pub async fn update(session: Session, Form(form): Form<UpdateCartForm>) -> Result<Response> {
    let key = line_key(form.product_id, form.variant_id.as_deref())?;
    let mut store = load_cart(session).await?;
    let outcome = store.update(key, form.quantity).await?;

    Ok(Triggers::for_update(outcome).apply(CartItemsTemplate {
        cart: CartView::from(store.cart()),
    }))
}

/// Remove item from cart (HTMX).
#[instrument(skip(session))]
pub async fn remove(session: Session, Form(form): Form<RemoveFromCartForm>) -> Result<Response> {
    let key = line_key(form.product_id, form.variant_id.as_deref())?;
    let mut store = load_cart(session).await?;
    let triggers = if store.remove(key).await? {
        Triggers::updated()
    } else {
        Triggers::default()
    };

    Ok(triggers.apply(CartItemsTemplate {
        cart: CartView::from(store.cart()),
    }))
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> Result<impl IntoResponse> {
    let store = load_cart(session).await?;
    Ok(CartCountTemplate {
        count: store.cart().item_count(),
    })
}
