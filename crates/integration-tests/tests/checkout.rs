//! End-to-end checkout tests: real backend client, fake backend, in-memory cart.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use retail_core::{ProductId, Quantity, Username};
use retail_integration_tests::FakeBackend;
use retail_storefront::cart::{CartStore, MemoryCartStore};
use retail_storefront::config::CheckoutConfig;
use retail_storefront::services::{CheckoutError, CheckoutService, CheckoutStatus, LineErrorKind};

fn alice() -> Username {
    Username::parse("alice").unwrap()
}

fn service(backend: &FakeBackend, store: &MemoryCartStore, line_timeout: Duration) -> CheckoutService {
    CheckoutService::new(
        Arc::new(backend.client()),
        Arc::new(store.clone()),
        &CheckoutConfig {
            line_timeout,
            max_concurrency: 4,
        },
    )
}

async fn fill(store: &MemoryCartStore, owner: &Username, lines: &[(&str, u32)]) {
    for (product, quantity) in lines {
        for _ in 0..*quantity {
            store
                .add_or_increment(owner, &ProductId::new(*product))
                .await
                .unwrap();
        }
    }
}

async fn quantities(store: &MemoryCartStore, owner: &Username) -> Vec<(String, u32)> {
    let mut lines: Vec<_> = store
        .list_lines(owner)
        .await
        .unwrap()
        .into_iter()
        .map(|l| (l.product_id.into_inner(), l.quantity.get()))
        .collect();
    lines.sort();
    lines
}

#[tokio::test]
async fn test_every_line_ordered_empties_cart() {
    let backend = FakeBackend::start().await;
    backend.add_customer("alice");
    backend.add_product("P1", "Mug", "9.50");
    backend.add_product("P2", "Plate", "4.00");
    let store = MemoryCartStore::new();
    fill(&store, &alice(), &[("P1", 2), ("P2", 1)]).await;

    let result = service(&backend, &store, Duration::from_secs(5))
        .checkout(&alice())
        .await
        .unwrap();

    assert_eq!(result.status(), CheckoutStatus::Ordered);
    assert_eq!(result.submitted_count, 2);
    assert!(quantities(&store, &alice()).await.is_empty());

    let mut ordered: Vec<_> = backend
        .orders()
        .into_iter()
        .map(|o| (o.product_id.into_inner(), o.quantity, o.username))
        .collect();
    ordered.sort();
    assert_eq!(
        ordered,
        [
            ("P1".to_string(), 2, "alice".to_string()),
            ("P2".to_string(), 1, "alice".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_failed_line_stays_and_others_are_ordered() {
    let backend = FakeBackend::start().await;
    backend.add_customer("alice");
    backend.add_product("P1", "Mug", "9.50");
    backend.add_product("P2", "Plate", "4.00");
    backend.add_product("P3", "Bowl", "6.25");
    backend.fail_orders_for("P2", 500);
    let store = MemoryCartStore::new();
    fill(&store, &alice(), &[("P1", 1), ("P2", 3), ("P3", 1)]).await;

    let result = service(&backend, &store, Duration::from_secs(5))
        .checkout(&alice())
        .await
        .unwrap();

    assert_eq!(result.status(), CheckoutStatus::PartiallyOrdered);
    assert_eq!(result.succeeded_count, 2);
    assert_eq!(backend.order_attempts(), 3);

    let failed = result.failed_lines.first().unwrap();
    assert_eq!(failed.product_id, ProductId::new("P2"));
    assert_eq!(failed.quantity, Quantity::new(3).unwrap());
    assert_eq!(failed.error().unwrap().kind, LineErrorKind::Server);

    assert_eq!(quantities(&store, &alice()).await, [("P2".to_string(), 3)]);
}

#[tokio::test]
async fn test_nothing_ordered_leaves_cart_unchanged() {
    let backend = FakeBackend::start().await;
    backend.add_customer("alice");
    backend.fail_orders_for("P1", 503);
    let store = MemoryCartStore::new();
    // P2 is unknown to the backend
    fill(&store, &alice(), &[("P1", 1), ("P2", 2)]).await;

    let result = service(&backend, &store, Duration::from_secs(5))
        .checkout(&alice())
        .await
        .unwrap();

    assert_eq!(result.status(), CheckoutStatus::NothingOrdered);
    assert_eq!(result.failed_lines.len(), 2);
    let kinds: Vec<_> = result
        .failed_lines
        .iter()
        .map(|l| (l.product_id.as_str().to_string(), l.error().unwrap().kind))
        .collect();
    assert!(kinds.contains(&("P1".to_string(), LineErrorKind::Server)));
    assert!(kinds.contains(&("P2".to_string(), LineErrorKind::NotFound)));

    assert_eq!(
        quantities(&store, &alice()).await,
        [("P1".to_string(), 1), ("P2".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_slow_line_times_out_without_blocking_others() {
    let backend = FakeBackend::start().await;
    backend.add_customer("alice");
    backend.add_product("P1", "Mug", "9.50");
    backend.add_product("P2", "Plate", "4.00");
    backend.delay_orders_for("P2", Duration::from_secs(3));
    let store = MemoryCartStore::new();
    fill(&store, &alice(), &[("P1", 1), ("P2", 1)]).await;

    let result = service(&backend, &store, Duration::from_millis(300))
        .checkout(&alice())
        .await
        .unwrap();

    assert_eq!(result.status(), CheckoutStatus::PartiallyOrdered);
    let failed = result.failed_lines.first().unwrap();
    assert_eq!(failed.product_id, ProductId::new("P2"));
    assert!(failed.error().unwrap().is_retryable());
    assert_eq!(quantities(&store, &alice()).await, [("P2".to_string(), 1)]);
}

#[tokio::test]
async fn test_unknown_customer_submits_nothing() {
    let backend = FakeBackend::start().await;
    backend.add_customer("bob");
    backend.add_product("P1", "Mug", "9.50");
    let store = MemoryCartStore::new();
    fill(&store, &alice(), &[("P1", 1)]).await;

    let err = service(&backend, &store, Duration::from_secs(5))
        .checkout(&alice())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::CustomerNotFound(_)), "{err:?}");
    assert_eq!(backend.order_attempts(), 0);
    assert_eq!(quantities(&store, &alice()).await, [("P1".to_string(), 1)]);
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let backend = FakeBackend::start().await;
    backend.add_customer("alice");
    let store = MemoryCartStore::new();

    let err = service(&backend, &store, Duration::from_secs(5))
        .checkout(&alice())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart), "{err:?}");
    assert_eq!(backend.order_attempts(), 0);
}
