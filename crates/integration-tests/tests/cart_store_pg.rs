//! Integration tests for the `PostgreSQL` cart store.
//!
//! These tests require a running `PostgreSQL` database reachable through
//! `STOREFRONT_DATABASE_URL`. Migrations are applied on connect.
//!
//! Run with: cargo test -p retail-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use retail_core::{ProductId, Quantity, Username};
use retail_storefront::cart::{CartStore, CartStoreError, PgCartStore, QuantityUpdate};

async fn store() -> PgCartStore {
    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .expect("STOREFRONT_DATABASE_URL must be set");
    let pool = PgPool::connect(&database_url).await.unwrap();
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .unwrap();
    PgCartStore::new(pool)
}

/// A username no other test run uses.
fn unique_owner() -> Username {
    Username::parse(&format!("test-{}", Uuid::new_v4())).unwrap()
}

async fn quantity_of(store: &PgCartStore, owner: &Username, product: &str) -> Option<u32> {
    store
        .list_lines(owner)
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.product_id.as_str() == product)
        .map(|l| l.quantity.get())
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_concurrent_adds_are_not_lost() {
    let store = Arc::new(store().await);
    let owner = unique_owner();
    let product = ProductId::new("P1");

    let tasks: Vec<_> = (0..25)
        .map(|_| {
            let store = Arc::clone(&store);
            let owner = owner.clone();
            let product = product.clone();
            tokio::spawn(async move { store.add_or_increment(&owner, &product).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(quantity_of(&store, &owner, "P1").await, Some(25));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_set_quantities_overwrites_and_removes() {
    let store = store().await;
    let owner = unique_owner();
    store.add_or_increment(&owner, &ProductId::new("P1")).await.unwrap();
    store.add_or_increment(&owner, &ProductId::new("P2")).await.unwrap();

    store
        .set_quantities(
            &owner,
            &[
                QuantityUpdate {
                    product_id: ProductId::new("P1"),
                    quantity: 7,
                },
                QuantityUpdate {
                    product_id: ProductId::new("P2"),
                    quantity: -1,
                },
                QuantityUpdate {
                    product_id: ProductId::new("P3"),
                    quantity: 4,
                },
            ],
        )
        .await
        .unwrap();

    assert_eq!(quantity_of(&store, &owner, "P1").await, Some(7));
    assert_eq!(quantity_of(&store, &owner, "P2").await, None);
    assert_eq!(quantity_of(&store, &owner, "P3").await, None);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_overflowing_update_changes_nothing() {
    let store = store().await;
    let owner = unique_owner();
    store.add_or_increment(&owner, &ProductId::new("P1")).await.unwrap();

    let err = store
        .set_quantities(
            &owner,
            &[QuantityUpdate {
                product_id: ProductId::new("P1"),
                quantity: i64::from(Quantity::MAX) + 1,
            }],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CartStoreError::QuantityOverflow(_)), "{err:?}");
    assert_eq!(quantity_of(&store, &owner, "P1").await, Some(1));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_clear_keeps_units_added_after_capture() {
    let store = store().await;
    let owner = unique_owner();
    store.add_or_increment(&owner, &ProductId::new("P1")).await.unwrap();
    store.add_or_increment(&owner, &ProductId::new("P2")).await.unwrap();

    let captured = store.list_lines(&owner).await.unwrap();

    // Arrives while orders are in flight
    store.add_or_increment(&owner, &ProductId::new("P1")).await.unwrap();
    store.add_or_increment(&owner, &ProductId::new("P9")).await.unwrap();

    store.clear(&owner, &captured).await.unwrap();

    assert_eq!(quantity_of(&store, &owner, "P1").await, Some(1));
    assert_eq!(quantity_of(&store, &owner, "P2").await, None);
    assert_eq!(quantity_of(&store, &owner, "P9").await, Some(1));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_owners_are_isolated() {
    let store = store().await;
    let alice = unique_owner();
    let bob = unique_owner();
    store.add_or_increment(&alice, &ProductId::new("P1")).await.unwrap();

    assert!(store.list_lines(&bob).await.unwrap().is_empty());

    store.remove(&bob, &ProductId::new("P1")).await.unwrap();
    assert_eq!(quantity_of(&store, &alice, "P1").await, Some(1));
}
