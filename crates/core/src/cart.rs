//! Shopping cart with stock reconciliation.
//!
//! Lines are keyed by `(product, variant)` and carry a snapshot of the stock
//! available when the line was last added. Quantities never exceed that
//! snapshot, and a line whose quantity drops to zero is removed.
//!
//! Adding and editing treat an oversized quantity differently: an add that
//! would overshoot the stock is rejected in full, while a direct quantity
//! edit snaps back to the maximum.
//!
//! The whole cart is persisted as a [`CartPayload`] carrying
//! [`CART_SCHEMA_VERSION`]. Payloads that do not match the current schema are
//! discarded wholesale by [`Cart::hydrate`], never repaired field by field.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CurrencyCode, Price, ProductId, VariantId, VendorId};

/// Version written into every persisted cart payload.
pub const CART_SCHEMA_VERSION: u32 = 2;

/// Field every persisted line must carry to be recognised.
pub const IDENTITY_KEY: &str = "product_id";

/// Identity of a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

/// A single line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    pub quantity: u32,
    pub unit_price: Price,
    /// Stock available when the line was last added.
    pub stock_ceiling: u32,
    pub vendor_id: VendorId,
}

impl CartLine {
    /// The line's identity.
    #[must_use]
    pub const fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id,
            variant_id: self.variant_id,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Result of [`Cart::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The line was inserted or merged; `quantity` is the new line quantity.
    Added { quantity: u32 },
    /// The request would exceed stock; the cart is unchanged.
    Rejected {
        requested: u32,
        in_cart: u32,
        available: u32,
    },
    /// A zero quantity was requested.
    InvalidQuantity,
}

impl AddOutcome {
    /// Whether a successful add should open the cart drawer.
    #[must_use]
    pub const fn opens_drawer(&self) -> bool {
        matches!(self, Self::Added { .. })
    }
}

/// Result of [`Cart::update_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Quantity set exactly as requested.
    Set { quantity: u32 },
    /// Requested more than the stock snapshot; quantity set to the ceiling.
    Clamped { requested: i64, to: u32 },
    /// Target was zero or negative; the line is gone.
    Removed,
    /// No line with that key.
    Missing,
}

/// A shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Look up a line.
    #[must_use]
    pub fn line(&self, key: LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.key() == key)
    }

    /// Add `candidate.quantity` units of a line.
    ///
    /// If a line with the same key exists the quantities are summed. The
    /// candidate's `stock_ceiling` is the freshest snapshot and is the one
    /// checked. When the total would exceed it nothing changes.
    pub fn add(&mut self, candidate: CartLine) -> AddOutcome {
        if candidate.quantity == 0 {
            return AddOutcome::InvalidQuantity;
        }

        let key = candidate.key();
        let available = candidate.stock_ceiling;

        match self.lines.iter_mut().find(|line| line.key() == key) {
            Some(existing) => {
                let total = existing.quantity.saturating_add(candidate.quantity);
                if total > available {
                    return AddOutcome::Rejected {
                        requested: candidate.quantity,
                        in_cart: existing.quantity,
                        available,
                    };
                }
                existing.quantity = total;
                existing.stock_ceiling = available;
                existing.unit_price = candidate.unit_price;
                existing.title = candidate.title;
                existing.variant_title = candidate.variant_title;
                AddOutcome::Added { quantity: total }
            }
            None => {
                if candidate.quantity > available {
                    return AddOutcome::Rejected {
                        requested: candidate.quantity,
                        in_cart: 0,
                        available,
                    };
                }
                let quantity = candidate.quantity;
                self.lines.push(candidate);
                AddOutcome::Added { quantity }
            }
        }
    }

    /// Set a line's quantity directly.
    ///
    /// `target <= 0` removes the line; a target above the stock snapshot is
    /// clamped to it.
    pub fn update_quantity(&mut self, key: LineKey, target: i64) -> UpdateOutcome {
        let Some(index) = self.lines.iter().position(|line| line.key() == key) else {
            return UpdateOutcome::Missing;
        };

        if target <= 0 {
            self.lines.remove(index);
            return UpdateOutcome::Removed;
        }

        let Some(line) = self.lines.get_mut(index) else {
            return UpdateOutcome::Missing;
        };
        let ceiling = line.stock_ceiling;
        match u32::try_from(target) {
            Ok(quantity) if quantity <= ceiling => {
                line.quantity = quantity;
                UpdateOutcome::Set { quantity }
            }
            _ => {
                line.quantity = ceiling;
                if ceiling == 0 {
                    self.lines.remove(index);
                    return UpdateOutcome::Removed;
                }
                UpdateOutcome::Clamped {
                    requested: target,
                    to: ceiling,
                }
            }
        }
    }

    /// Remove a line. Returns whether it existed.
    pub fn remove(&mut self, key: LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.key() != key);
        self.lines.len() != before
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total_price(&self) -> Price {
        let currency = self
            .lines
            .first()
            .map_or_else(CurrencyCode::default, |line| line.unit_price.currency_code);
        let amount = self
            .lines
            .iter()
            .map(|line| line.line_total().amount)
            .fold(Decimal::ZERO, |acc, amount| acc + amount);
        Price::new(amount, currency)
    }

    /// Serialize into the persisted shape.
    #[must_use]
    pub fn to_payload(&self) -> CartPayload {
        CartPayload {
            version: CART_SCHEMA_VERSION,
            lines: self.lines.clone(),
        }
    }

    /// Rebuild a cart from a stored payload.
    ///
    /// Anything other than a current-version payload whose every line carries
    /// [`IDENTITY_KEY`] and satisfies `0 < quantity <= stock_ceiling` is
    /// discarded in full.
    #[must_use]
    pub fn hydrate(stored: Value) -> Hydrated {
        let Value::Object(mut envelope) = stored else {
            // Bare arrays are the unversioned legacy format.
            return Hydrated::Discarded(DiscardReason::VersionMismatch { found: None });
        };

        let found = envelope.get("version").and_then(Value::as_u64);
        if found != Some(u64::from(CART_SCHEMA_VERSION)) {
            return Hydrated::Discarded(DiscardReason::VersionMismatch { found });
        }

        let Some(Value::Array(raw_lines)) = envelope.remove("lines") else {
            return Hydrated::Discarded(DiscardReason::Malformed(
                "missing lines array".to_owned(),
            ));
        };

        let has_identity = raw_lines
            .iter()
            .all(|line| line.get(IDENTITY_KEY).is_some_and(|id| !id.is_null()));
        if !has_identity {
            return Hydrated::Discarded(DiscardReason::MissingIdentity);
        }

        let lines: Vec<CartLine> = match serde_json::from_value(Value::Array(raw_lines)) {
            Ok(lines) => lines,
            Err(e) => return Hydrated::Discarded(DiscardReason::Malformed(e.to_string())),
        };

        let mut seen = HashSet::with_capacity(lines.len());
        for line in &lines {
            if line.quantity == 0 || line.quantity > line.stock_ceiling {
                return Hydrated::Discarded(DiscardReason::Malformed(format!(
                    "line {} has quantity {} outside 1..={}",
                    line.product_id, line.quantity, line.stock_ceiling
                )));
            }
            if !seen.insert(line.key()) {
                return Hydrated::Discarded(DiscardReason::Malformed(format!(
                    "duplicate line for product {}",
                    line.product_id
                )));
            }
        }

        Hydrated::Restored(Self { lines })
    }
}

/// Persisted cart shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartPayload {
    pub version: u32,
    pub lines: Vec<CartLine>,
}

/// Outcome of [`Cart::hydrate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hydrated {
    /// The stored cart was valid.
    Restored(Cart),
    /// The stored cart was rejected; start from empty.
    Discarded(DiscardReason),
}

impl Hydrated {
    /// The hydrated cart, empty if the payload was discarded.
    #[must_use]
    pub fn into_cart(self) -> Cart {
        match self {
            Self::Restored(cart) => cart,
            Self::Discarded(_) => Cart::new(),
        }
    }
}

/// Why a stored cart was discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscardReason {
    #[error("cart schema version {found:?} does not match {CART_SCHEMA_VERSION}")]
    VersionMismatch { found: Option<u64> },
    #[error("a cart line is missing its `{IDENTITY_KEY}`")]
    MissingIdentity,
    #[error("malformed cart payload: {0}")]
    Malformed(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn line(product: i32, variant: Option<i32>, quantity: u32, ceiling: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            variant_id: variant.map(VariantId::new),
            title: format!("Product {product}"),
            variant_title: None,
            quantity,
            unit_price: Price::new(Decimal::new(250, 0), CurrencyCode::INR),
            stock_ceiling: ceiling,
            vendor_id: VendorId::new(1),
        }
    }

    fn key(product: i32, variant: Option<i32>) -> LineKey {
        LineKey {
            product_id: ProductId::new(product),
            variant_id: variant.map(VariantId::new),
        }
    }

    #[test]
    fn test_add_new_line_opens_drawer() {
        let mut cart = Cart::new();
        let outcome = cart.add(line(1, None, 2, 10));
        assert_eq!(outcome, AddOutcome::Added { quantity: 2 });
        assert!(outcome.opens_drawer());
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_add_merges_same_key() {
        let mut cart = Cart::new();
        cart.add(line(1, Some(3), 2, 10));
        assert_eq!(
            cart.add(line(1, Some(3), 3, 10)),
            AddOutcome::Added { quantity: 5 }
        );
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_variants_are_separate_lines() {
        let mut cart = Cart::new();
        cart.add(line(1, Some(3), 1, 10));
        cart.add(line(1, Some(4), 1, 10));
        cart.add(line(1, None, 1, 10));
        assert_eq!(cart.lines().len(), 3);
    }

    #[test]
    fn test_add_overflow_rejected_in_full() {
        let mut cart = Cart::new();
        cart.add(line(1, None, 8, 10));
        let outcome = cart.add(line(1, None, 5, 10));
        assert_eq!(
            outcome,
            AddOutcome::Rejected {
                requested: 5,
                in_cart: 8,
                available: 10
            }
        );
        assert!(!outcome.opens_drawer());
        assert_eq!(cart.line(key(1, None)).unwrap().quantity, 8);
    }

    #[test]
    fn test_fresh_add_above_ceiling_rejected() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.add(line(1, None, 11, 10)),
            AddOutcome::Rejected { in_cart: 0, .. }
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_zero_is_invalid() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, None, 0, 10)), AddOutcome::InvalidQuantity);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_uses_fresh_stock_snapshot() {
        let mut cart = Cart::new();
        cart.add(line(1, None, 2, 10));
        // Stock has since dropped to 3.
        assert!(matches!(
            cart.add(line(1, None, 2, 3)),
            AddOutcome::Rejected { available: 3, .. }
        ));
        assert_eq!(cart.line(key(1, None)).unwrap().stock_ceiling, 10);
    }

    #[test]
    fn test_update_clamps_to_ceiling() {
        let mut cart = Cart::new();
        cart.add(line(1, None, 8, 10));
        assert_eq!(
            cart.update_quantity(key(1, None), 15),
            UpdateOutcome::Clamped {
                requested: 15,
                to: 10
            }
        );
        assert_eq!(cart.line(key(1, None)).unwrap().quantity, 10);
    }

    #[test]
    fn test_update_sets_exactly() {
        let mut cart = Cart::new();
        cart.add(line(1, None, 8, 10));
        assert_eq!(
            cart.update_quantity(key(1, None), 3),
            UpdateOutcome::Set { quantity: 3 }
        );
    }

    #[test]
    fn test_update_zero_or_negative_removes() {
        let mut cart = Cart::new();
        cart.add(line(1, None, 2, 10));
        cart.add(line(2, None, 2, 10));
        assert_eq!(cart.update_quantity(key(1, None), 0), UpdateOutcome::Removed);
        assert_eq!(cart.update_quantity(key(2, None), -4), UpdateOutcome::Removed);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_missing_line() {
        let mut cart = Cart::new();
        assert_eq!(cart.update_quantity(key(9, None), 1), UpdateOutcome::Missing);
    }

    #[test]
    fn test_totals_fold_over_lines() {
        let mut cart = Cart::new();
        cart.add(line(1, None, 2, 10));
        cart.add(line(2, None, 3, 10));
        assert_eq!(cart.item_count(), 5);
        assert_eq!(cart.total_price().amount, Decimal::new(1250, 0));
        assert_eq!(Cart::new().total_price().amount, Decimal::ZERO);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add(line(1, None, 2, 10));
        cart.add(line(2, None, 1, 10));
        assert!(cart.remove(key(1, None)));
        assert!(!cart.remove(key(1, None)));
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_hydrate_restores_current_payload() {
        let mut cart = Cart::new();
        cart.add(line(1, Some(2), 2, 10));
        let stored = serde_json::to_value(cart.to_payload()).unwrap();
        assert_eq!(Cart::hydrate(stored), Hydrated::Restored(cart));
    }

    #[test]
    fn test_hydrate_discards_line_without_identity() {
        let mut cart = Cart::new();
        cart.add(line(1, None, 2, 10));
        let mut stored = serde_json::to_value(cart.to_payload()).unwrap();
        stored["lines"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "id": "legacy-1", "quantity": 1 }));

        assert_eq!(
            Cart::hydrate(stored),
            Hydrated::Discarded(DiscardReason::MissingIdentity)
        );
    }

    #[test]
    fn test_hydrate_discards_bare_array_and_old_versions() {
        let legacy = json!([{ "id": "abc", "quantity": 1 }]);
        assert_eq!(
            Cart::hydrate(legacy),
            Hydrated::Discarded(DiscardReason::VersionMismatch { found: None })
        );
        let old = json!({ "version": 1, "lines": [] });
        assert_eq!(
            Cart::hydrate(old),
            Hydrated::Discarded(DiscardReason::VersionMismatch { found: Some(1) })
        );
    }

    #[test]
    fn test_hydrate_discards_quantity_outside_ceiling() {
        let mut payload = Cart::new().to_payload();
        payload.lines.push(line(1, None, 12, 10));
        let stored = serde_json::to_value(payload).unwrap();
        assert!(matches!(
            Cart::hydrate(stored),
            Hydrated::Discarded(DiscardReason::Malformed(_))
        ));
    }

    #[test]
    fn test_discarded_hydration_is_empty_cart() {
        let hydrated = Cart::hydrate(json!("garbage"));
        assert!(hydrated.into_cart().is_empty());
    }
}
