//! Cart behaviour against device storage.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use serde_json::json;

use mandir_core::cart::{
    AddOutcome, CART_SCHEMA_VERSION, Cart, DiscardReason, Hydrated, UpdateOutcome,
};
use mandir_integration_tests::line;
use mandir_storefront::models::session_keys;
use mandir_storefront::services::{CartStore, MemoryStorage};

#[tokio::test]
async fn add_over_ceiling_is_rejected_but_update_clamps() {
    let storage = MemoryStorage::new();
    let mut store = CartStore::load(storage.clone()).await.unwrap();

    assert_eq!(
        store.add(line(1, None, 8, 10)).await.unwrap(),
        AddOutcome::Added { quantity: 8 }
    );
    assert_eq!(
        store.add(line(1, None, 5, 10)).await.unwrap(),
        AddOutcome::Rejected {
            requested: 5,
            in_cart: 8,
            available: 10
        }
    );
    assert_eq!(store.cart().item_count(), 8);

    let key = store.cart().lines()[0].key();
    assert_eq!(
        store.update(key, 15).await.unwrap(),
        UpdateOutcome::Clamped {
            requested: 15,
            to: 10
        }
    );

    let reloaded = CartStore::load(storage).await.unwrap();
    assert_eq!(reloaded.cart().item_count(), 10);
}

#[tokio::test]
async fn variants_of_one_product_are_separate_lines() {
    let mut store = CartStore::load(MemoryStorage::new()).await.unwrap();
    store.add(line(3, Some(1), 1, 5)).await.unwrap();
    store.add(line(3, Some(2), 2, 5)).await.unwrap();
    store.add(line(3, Some(1), 1, 5)).await.unwrap();

    assert_eq!(store.cart().lines().len(), 2);
    assert_eq!(store.cart().item_count(), 4);
}

#[tokio::test]
async fn zero_quantity_removes_line_across_reload() {
    let storage = MemoryStorage::new();
    let mut store = CartStore::load(storage.clone()).await.unwrap();
    store.add(line(1, None, 2, 5)).await.unwrap();
    store.add(line(2, None, 1, 5)).await.unwrap();

    let key = store.cart().lines()[0].key();
    assert_eq!(store.update(key, 0).await.unwrap(), UpdateOutcome::Removed);

    let reloaded = CartStore::load(storage).await.unwrap();
    assert!(reloaded.cart().line(key).is_none());
    assert_eq!(reloaded.cart().lines().len(), 1);
}

#[tokio::test]
async fn legacy_payload_is_discarded_and_cleared() {
    let storage = MemoryStorage::new();
    storage
        .put(
            session_keys::CART,
            json!([{"id": 9, "title": "Rudraksha mala", "quantity": 1}]),
        )
        .await;

    let store = CartStore::load(storage.clone()).await.unwrap();
    assert!(store.cart().is_empty());
    assert!(storage.get(session_keys::CART).await.is_none());
}

#[tokio::test]
async fn lines_without_identity_are_discarded() {
    let payload = json!({
        "version": CART_SCHEMA_VERSION,
        "lines": [
            {
                "product_id": 4,
                "title": "Kumkum",
                "quantity": 1,
                "unit_price": {"amount": "40.00", "currency_code": "INR"},
                "stock_ceiling": 9,
                "vendor_id": 7
            },
            {"title": "Agarbatti", "quantity": 2, "stock_ceiling": 5, "vendor_id": 7}
        ]
    });
    assert!(matches!(
        Cart::hydrate(payload.clone()),
        Hydrated::Discarded(DiscardReason::MissingIdentity)
    ));

    let storage = MemoryStorage::new();
    storage.put(session_keys::CART, payload).await;

    let store = CartStore::load(storage.clone()).await.unwrap();
    assert!(store.cart().is_empty());
    assert!(storage.get(session_keys::CART).await.is_none());
}

#[tokio::test]
async fn clear_empties_storage_payload() {
    let storage = MemoryStorage::new();
    let mut store = CartStore::load(storage.clone()).await.unwrap();
    store.add(line(1, None, 1, 1)).await.unwrap();
    store.clear().await.unwrap();

    let reloaded = CartStore::load(storage).await.unwrap();
    assert!(reloaded.cart().is_empty());
}
