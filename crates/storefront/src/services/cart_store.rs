//! The visitor's cart, loaded from and saved to device storage.
//!
//! A stored cart that fails hydration is thrown away and its key removed;
//! the visitor starts over with an empty cart.

use mandir_core::cart::{AddOutcome, Cart, CartLine, Hydrated, LineKey, UpdateOutcome};

use super::storage::{DeviceStorage, StorageError};
use crate::models::session::keys;

/// A cart bound to the storage it was loaded from.
#[derive(Debug)]
pub struct CartStore<D: DeviceStorage> {
    storage: D,
    cart: Cart,
}

impl<D: DeviceStorage> CartStore<D> {
    /// Load the cart for this device.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the storage backend fails.
    pub async fn load(storage: D) -> Result<Self, StorageError> {
        let cart = match storage.load(keys::CART).await? {
            None => Cart::new(),
            Some(stored) => match Cart::hydrate(stored) {
                Hydrated::Restored(cart) => cart,
                Hydrated::Discarded(reason) => {
                    tracing::warn!(%reason, "discarding stored cart");
                    storage.remove(keys::CART).await?;
                    Cart::new()
                }
            },
        };
        Ok(Self { storage, cart })
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Add a line, merging with an existing one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cart cannot be saved.
    pub async fn add(&mut self, line: CartLine) -> Result<AddOutcome, StorageError> {
        let outcome = self.cart.add(line);
        if matches!(outcome, AddOutcome::Added { .. }) {
            self.save().await?;
        }
        Ok(outcome)
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cart cannot be saved.
    pub async fn update(&mut self, key: LineKey, quantity: i64) -> Result<UpdateOutcome, StorageError> {
        let outcome = self.cart.update_quantity(key, quantity);
        if outcome != UpdateOutcome::Missing {
            self.save().await?;
        }
        Ok(outcome)
    }

    /// Remove a line. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cart cannot be saved.
    pub async fn remove(&mut self, key: LineKey) -> Result<bool, StorageError> {
        let removed = self.cart.remove(key);
        if removed {
            self.save().await?;
        }
        Ok(removed)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cart cannot be saved.
    pub async fn clear(&mut self) -> Result<(), StorageError> {
        if self.cart.is_empty() {
            return Ok(());
        }
        self.cart.clear();
        self.save().await
    }

    async fn save(&self) -> Result<(), StorageError> {
        let payload = serde_json::to_value(self.cart.to_payload())
            .map_err(|e| StorageError::Unavailable(format!("cart encoding failed: {e}")))?;
        self.storage.store(keys::CART, payload).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use mandir_core::cart::CART_SCHEMA_VERSION;
    use mandir_core::{CurrencyCode, Price, ProductId, VendorId};

    use super::*;
    use crate::services::storage::MemoryStorage;

    fn diya(quantity: u32, ceiling: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(11),
            variant_id: None,
            title: "Brass diya".to_owned(),
            variant_title: None,
            quantity,
            unit_price: Price::new(Decimal::new(199, 0), CurrencyCode::INR),
            stock_ceiling: ceiling,
            vendor_id: VendorId::new(2),
        }
    }

    #[tokio::test]
    async fn test_add_persists_versioned_payload() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::load(storage.clone()).await.unwrap();
        let outcome = store.add(diya(2, 5)).await.unwrap();
        assert!(outcome.opens_drawer());

        let saved = storage.get(keys::CART).await.unwrap();
        assert_eq!(saved["version"], json!(CART_SCHEMA_VERSION));
        assert_eq!(saved["lines"][0]["quantity"], json!(2));

        let reloaded = CartStore::load(storage).await.unwrap();
        assert_eq!(reloaded.cart().item_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_add_does_not_write() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::load(storage.clone()).await.unwrap();
        store.add(diya(8, 10)).await.unwrap();
        storage.put(keys::CART, json!("sentinel")).await;

        let outcome = store.add(diya(5, 10)).await.unwrap();
        assert!(matches!(outcome, AddOutcome::Rejected { .. }));
        assert_eq!(storage.get(keys::CART).await, Some(json!("sentinel")));
    }

    #[tokio::test]
    async fn test_legacy_cart_is_discarded_and_removed() {
        let storage = MemoryStorage::new();
        storage
            .put(keys::CART, json!([{"id": "gid://old", "quantity": 1}]))
            .await;
        let store = CartStore::load(storage.clone()).await.unwrap();
        assert!(store.cart().is_empty());
        assert!(storage.get(keys::CART).await.is_none());
    }

    #[tokio::test]
    async fn test_update_clamps_and_remove_clears() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::load(storage).await.unwrap();
        store.add(diya(1, 3)).await.unwrap();
        let key = store.cart().lines().first().unwrap().key();

        assert_eq!(
            store.update(key, 7).await.unwrap(),
            UpdateOutcome::Clamped { requested: 7, to: 3 }
        );
        assert!(store.remove(key).await.unwrap());
        assert!(!store.remove(key).await.unwrap());
        assert!(store.cart().is_empty());
    }
}
