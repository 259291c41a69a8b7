use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use retail_core::{OrderId, ProductId, Quantity};

use super::*;
use crate::backend::{Customer, MockBackend, Product};
use crate::cart::{CartStoreError, MemoryCartStore, QuantityUpdate};

fn alice() -> Username {
    Username::parse("alice").unwrap()
}

fn customer() -> Customer {
    Customer {
        id: CustomerId::new("C1"),
        username: "alice".to_string(),
        name: "Alice".to_string(),
        surname: "Smith".to_string(),
        email: "alice@example.com".to_string(),
        shipping_address: "1 Main St".to_string(),
    }
}

fn config() -> CheckoutConfig {
    CheckoutConfig {
        line_timeout: Duration::from_secs(5),
        max_concurrency: 4,
    }
}

async fn cart_with(store: &MemoryCartStore, items: &[(&str, u32)]) {
    for (product, quantity) in items {
        for _ in 0..*quantity {
            store
                .add_or_increment(&alice(), &ProductId::new(*product))
                .await
                .unwrap();
        }
    }
}

async fn cart_contents(store: &MemoryCartStore) -> Vec<(String, u32)> {
    let mut lines: Vec<_> = store
        .list_lines(&alice())
        .await
        .unwrap()
        .into_iter()
        .map(|l| (l.product_id.into_inner(), l.quantity.get()))
        .collect();
    lines.sort();
    lines
}

fn server_error() -> BackendError {
    BackendError::Server {
        status: 500,
        message: "insufficient stock".to_string(),
    }
}

fn mock_with_customer() -> MockBackend {
    let mut backend = MockBackend::new();
    backend
        .expect_get_customer_by_username()
        .returning(|_| Ok(customer()));
    backend
}

#[tokio::test]
async fn test_empty_cart_never_creates_orders() {
    let mut backend = mock_with_customer();
    backend.expect_create_order().never();

    let store = Arc::new(MemoryCartStore::new());
    let service = CheckoutService::new(Arc::new(backend), store, &config());

    let err = service.checkout(&alice()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));
}

#[tokio::test]
async fn test_missing_customer_leaves_cart_untouched() {
    let mut backend = MockBackend::new();
    backend
        .expect_get_customer_by_username()
        .times(1)
        .returning(|u| Err(BackendError::NotFound(format!("customer '{u}'"))));
    backend.expect_create_order().never();

    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 2)]).await;
    let service = CheckoutService::new(Arc::new(backend), store.clone(), &config());

    let err = service.checkout(&alice()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::CustomerNotFound(ref u) if u.as_str() == "alice"));
    assert_eq!(cart_contents(&store).await, vec![("P1".to_string(), 2)]);
}

#[tokio::test]
async fn test_customer_lookup_failure_is_not_not_found() {
    let mut backend = MockBackend::new();
    backend
        .expect_get_customer_by_username()
        .returning(|_| Err(BackendError::Transport("connection refused".to_string())));
    backend.expect_create_order().never();

    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 1)]).await;
    let service = CheckoutService::new(Arc::new(backend), store.clone(), &config());

    let err = service.checkout(&alice()).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::CustomerLookup(BackendError::Transport(_))
    ));
    assert_eq!(cart_contents(&store).await.len(), 1);
}

#[tokio::test]
async fn test_all_lines_succeed_empties_cart() {
    let mut backend = mock_with_customer();
    backend
        .expect_create_order()
        .times(3)
        .returning(|req| Ok(OrderId::new(format!("O-{}", req.product_id))));

    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 1), ("P2", 3), ("P3", 1)]).await;
    let service = CheckoutService::new(Arc::new(backend), store.clone(), &config());

    let result = service.checkout(&alice()).await.unwrap();

    assert_eq!(result.submitted_count, 3);
    assert_eq!(result.succeeded_count, result.submitted_count);
    assert!(result.failed_lines.is_empty());
    assert_eq!(result.status(), CheckoutStatus::Ordered);
    assert!(cart_contents(&store).await.is_empty());
}

#[tokio::test]
async fn test_orders_carry_customer_and_quantity() {
    let mut backend = mock_with_customer();
    backend
        .expect_create_order()
        .withf(|req| {
            req.customer_id.as_str() == "C1"
                && req.product_id.as_str() == "P1"
                && req.quantity == Quantity::new(3).unwrap()
        })
        .times(1)
        .returning(|_| Ok(OrderId::new("O1")));

    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 3)]).await;
    let service = CheckoutService::new(Arc::new(backend), store, &config());

    let result = service.checkout(&alice()).await.unwrap();
    assert_eq!(result.placed_orders[0].order_id(), Some(&OrderId::new("O1")));
}

#[tokio::test]
async fn test_one_failed_line_of_three_stays_in_cart() {
    let mut backend = mock_with_customer();
    backend.expect_create_order().times(3).returning(|req| {
        if req.product_id.as_str() == "P2" {
            Err(server_error())
        } else {
            Ok(OrderId::new(format!("O-{}", req.product_id)))
        }
    });

    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 1), ("P2", 2), ("P3", 1)]).await;
    let service = CheckoutService::new(Arc::new(backend), store.clone(), &config());

    let result = service.checkout(&alice()).await.unwrap();

    assert_eq!(result.failed_lines.len(), 1);
    assert_eq!(result.failed_lines[0].product_id.as_str(), "P2");
    assert_eq!(result.status(), CheckoutStatus::PartiallyOrdered);
    assert_eq!(cart_contents(&store).await, vec![("P2".to_string(), 2)]);
}

#[tokio::test]
async fn test_partial_success_scenario() {
    let mut backend = mock_with_customer();
    backend.expect_create_order().times(2).returning(|req| {
        match req.product_id.as_str() {
            "P1" => Ok(OrderId::new("O1")),
            _ => Err(server_error()),
        }
    });

    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 2), ("P2", 1)]).await;
    let service = CheckoutService::new(Arc::new(backend), store.clone(), &config());

    let result = service.checkout(&alice()).await.unwrap();

    assert_eq!(cart_contents(&store).await, vec![("P2".to_string(), 1)]);
    assert_eq!(result.submitted_count, 2);
    assert_eq!(result.succeeded_count, 1);
    assert_eq!(result.failed_lines.len(), 1);
    let failed = &result.failed_lines[0];
    assert_eq!(failed.product_id.as_str(), "P2");
    assert_eq!(failed.error().unwrap().kind, LineErrorKind::Server);
    assert_eq!(result.placed_orders[0].order_id(), Some(&OrderId::new("O1")));
}

#[tokio::test]
async fn test_every_line_failing_is_still_a_result() {
    let mut backend = mock_with_customer();
    backend
        .expect_create_order()
        .times(2)
        .returning(|_| Err(server_error()));

    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 1), ("P2", 1)]).await;
    let service = CheckoutService::new(Arc::new(backend), store.clone(), &config());

    let result = service.checkout(&alice()).await.unwrap();

    assert_eq!(result.succeeded_count, 0);
    assert_eq!(result.failed_lines.len(), 2);
    assert_eq!(result.status(), CheckoutStatus::NothingOrdered);
    assert_eq!(cart_contents(&store).await.len(), 2);
}

#[tokio::test]
async fn test_validation_failure_is_reported_per_line() {
    let mut backend = mock_with_customer();
    backend.expect_create_order().times(2).returning(|req| {
        if req.product_id.as_str() == "P1" {
            Err(BackendError::Validation("product ID is required".to_string()))
        } else {
            Ok(OrderId::new("O2"))
        }
    });

    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 1), ("P2", 1)]).await;
    let service = CheckoutService::new(Arc::new(backend), store.clone(), &config());

    let result = service.checkout(&alice()).await.unwrap();
    assert_eq!(
        result.failed_lines[0].error().unwrap().kind,
        LineErrorKind::Validation
    );
    assert_eq!(cart_contents(&store).await, vec![("P1".to_string(), 1)]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Hand-written collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Backend whose `create_order` runs `delay` before answering.
struct ScriptedBackend {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    started: Notify,
    release: Semaphore,
}

impl ScriptedBackend {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: Notify::new(),
            release: Semaphore::new(Semaphore::MAX_PERMITS),
        }
    }

    /// Hold every `create_order` until [`Self::open`] is called.
    fn gated() -> Self {
        Self {
            release: Semaphore::new(0),
            ..Self::new(Duration::ZERO)
        }
    }

    fn open(&self) {
        self.release.add_permits(64);
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn get_customer_by_username(&self, _: &Username) -> Result<Customer, BackendError> {
        Ok(customer())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, BackendError> {
        Err(BackendError::NotFound(id.to_string()))
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderId, BackendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.started.notify_one();

        let _permit = self.release.acquire().await.unwrap();
        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(OrderId::new(format!("O-{}", request.product_id)))
    }
}

/// Memory store whose `clear` always fails.
struct FailingClearStore(MemoryCartStore);

#[async_trait]
impl CartStore for FailingClearStore {
    async fn add_or_increment(
        &self,
        owner: &Username,
        product_id: &ProductId,
    ) -> Result<CartLine, CartStoreError> {
        self.0.add_or_increment(owner, product_id).await
    }

    async fn set_quantities(
        &self,
        owner: &Username,
        updates: &[QuantityUpdate],
    ) -> Result<(), CartStoreError> {
        self.0.set_quantities(owner, updates).await
    }

    async fn remove(&self, owner: &Username, product_id: &ProductId) -> Result<(), CartStoreError> {
        self.0.remove(owner, product_id).await
    }

    async fn list_lines(&self, owner: &Username) -> Result<Vec<CartLine>, CartStoreError> {
        self.0.list_lines(owner).await
    }

    async fn clear(&self, _: &Username, _: &[CartLine]) -> Result<(), CartStoreError> {
        Err(CartStoreError::Unavailable("disk full".to_string()))
    }
}

#[tokio::test]
async fn test_add_during_checkout_survives_clear() {
    let backend = Arc::new(ScriptedBackend::gated());
    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 2), ("P2", 1)]).await;

    let service = CheckoutService::new(backend.clone(), store.clone(), &config());
    let checkout = tokio::spawn(async move { service.checkout(&alice()).await });

    // Lines are captured before the first order is submitted.
    backend.started.notified().await;
    store
        .add_or_increment(&alice(), &ProductId::new("P9"))
        .await
        .unwrap();
    store
        .add_or_increment(&alice(), &ProductId::new("P1"))
        .await
        .unwrap();

    backend.open();
    let result = checkout.await.unwrap().unwrap();

    assert_eq!(result.succeeded_count, 2);
    assert_eq!(
        cart_contents(&store).await,
        vec![("P1".to_string(), 1), ("P9".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_timed_out_line_is_transport_failure() {
    let backend = Arc::new(ScriptedBackend::new(Duration::from_secs(30)));
    let store = Arc::new(MemoryCartStore::new());
    cart_with(&store, &[("P1", 1)]).await;

    let config = CheckoutConfig {
        line_timeout: Duration::from_millis(50),
        max_concurrency: 1,
    };
    let service = CheckoutService::new(backend, store.clone(), &config);

    let result = service.checkout(&alice()).await.unwrap();

    assert_eq!(result.succeeded_count, 0);
    let error = result.failed_lines[0].error().unwrap();
    assert_eq!(error.kind, LineErrorKind::Transport);
    assert!(error.is_retryable());
    assert_eq!(cart_contents(&store).await, vec![("P1".to_string(), 1)]);
}

#[tokio::test]
async fn test_submission_respects_concurrency_limit() {
    let backend = Arc::new(ScriptedBackend::new(Duration::from_millis(20)));
    let store = Arc::new(MemoryCartStore::new());
    cart_with(
        &store,
        &[("P1", 1), ("P2", 1), ("P3", 1), ("P4", 1), ("P5", 1), ("P6", 1)],
    )
    .await;

    let config = CheckoutConfig {
        line_timeout: Duration::from_secs(5),
        max_concurrency: 2,
    };
    let service = CheckoutService::new(backend.clone(), store.clone(), &config);

    let result = service.checkout(&alice()).await.unwrap();

    assert_eq!(result.succeeded_count, 6);
    assert!(backend.peak.load(Ordering::SeqCst) <= 2);
    // Outcomes come back in cart order regardless of completion order.
    let ids: Vec<_> = result
        .placed_orders
        .iter()
        .map(|o| o.product_id.as_str().to_string())
        .collect();
    assert_eq!(ids, ["P1", "P2", "P3", "P4", "P5", "P6"]);
}

#[tokio::test]
async fn test_reconciliation_failure_is_reported_not_raised() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO));
    let store = Arc::new(FailingClearStore(MemoryCartStore::new()));
    store
        .add_or_increment(&alice(), &ProductId::new("P1"))
        .await
        .unwrap();

    let service = CheckoutService::new(backend, store, &config());
    let result = service.checkout(&alice()).await.unwrap();

    assert_eq!(result.succeeded_count, 1);
    assert!(result.reconciliation_error.is_some());
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn test_checkout_future_is_send() {
    let service = CheckoutService::new(
        Arc::new(MockBackend::new()),
        Arc::new(MemoryCartStore::new()),
        &config(),
    );
    let owner = alice();
    let checkout = service.checkout(&owner);
    assert_send(&checkout);
}
