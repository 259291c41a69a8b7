//! Integration test harness for the retail storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # Fake-backend tests (no external services)
//! cargo test -p retail-integration-tests
//!
//! # PostgreSQL cart store tests
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p retail-integration-tests -- --ignored
//! ```
//!
//! # Pieces
//!
//! - [`FakeBackend`] - In-process HTTP backend with scriptable failures
//! - [`TestStorefront`] - The storefront router on an ephemeral port, with
//!   in-memory sessions and a test-only login route

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tower_sessions::{MemoryStore, Session};

use retail_core::{CustomerId, OrderId, OrderStatus, Price, ProductId, Quantity, Username};
use retail_storefront::backend::{BackendClient, Customer, Order, Product};
use retail_storefront::cart::CartStore;
use retail_storefront::config::{BackendConfig, StorefrontConfig};
use retail_storefront::middleware::{session_layer, set_current_user};
use retail_storefront::models::CurrentUser;
use retail_storefront::routes;
use retail_storefront::state::AppState;

// =============================================================================
// Fake backend
// =============================================================================

/// A multipart upload received by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub file_name: Option<String>,
    pub size: usize,
    pub order_id: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    customers: Vec<Customer>,
    products: HashMap<ProductId, Product>,
    orders: Vec<Order>,
    uploads: Vec<RecordedUpload>,
    order_attempts: usize,
    failing_orders: HashMap<ProductId, u16>,
    slow_orders: HashMap<ProductId, Duration>,
    broken_lists: HashSet<&'static str>,
    omit_created_ids: bool,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

type Shared = Arc<Mutex<FakeState>>;

/// In-process stand-in for the remote retail backend.
///
/// Serves the same paths under `/api/` and keeps everything in memory.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Shared,
}

impl FakeBackend {
    /// Start the fake backend on an ephemeral port.
    pub async fn start() -> Self {
        let state: Shared = Arc::default();

        let api = Router::new()
            .route("/customers", get(list_customers).post(create_customer))
            .route(
                "/customers/{id}",
                get(get_customer).put(update_customer).delete(delete_customer),
            )
            .route("/products", get(list_products))
            .route(
                "/products/{id}",
                get(get_product).put(update_product).delete(delete_product),
            )
            .route("/orders", get(list_orders).post(create_order))
            .route("/orders/{id}", get(get_order).delete(delete_order))
            .route("/orders/{id}/status", post(update_order_status))
            .route("/proofs/upload", post(upload_proof))
            .route("/uploads/{kind}", post(upload_file));
        let app = Router::new().nest("/api", api).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend server");
        });

        Self { addr, state }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake backend state poisoned")
    }

    /// Root URL, without the `/api/` prefix.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Backend configuration pointing at this fake.
    #[must_use]
    pub fn config(&self, timeout: Duration) -> BackendConfig {
        BackendConfig::new(&self.url(), None, timeout).expect("fake backend URL")
    }

    /// A real client talking to this fake.
    #[must_use]
    pub fn client(&self) -> BackendClient {
        BackendClient::new(&self.config(Duration::from_secs(5))).expect("backend client")
    }

    /// Register a customer and return its id.
    pub fn add_customer(&self, username: &str) -> CustomerId {
        let mut state = self.lock();
        let id = CustomerId::new(state.next_id("C"));
        state.customers.push(Customer {
            id: id.clone(),
            username: username.to_string(),
            name: "Test".to_string(),
            surname: "Customer".to_string(),
            email: format!("{username}@example.com"),
            shipping_address: "1 Test Street".to_string(),
        });
        id
    }

    /// Register a product under a fixed id. `price` is decimal text, e.g. `"9.50"`.
    pub fn add_product(&self, id: &str, name: &str, price: &str) -> ProductId {
        let id = ProductId::new(id);
        let product = Product {
            id: id.clone(),
            name: name.to_string(),
            description: String::new(),
            unit_price: Price::new(price.parse::<Decimal>().expect("decimal price")),
            stock_available: 100,
            image_url: format!("https://img.example.com/{id}.png"),
        };
        self.lock().products.insert(id.clone(), product);
        id
    }

    /// Insert an order directly, as if placed earlier.
    pub fn add_order(&self, username: &str, product_id: &str, order_date: &str) -> OrderId {
        let mut state = self.lock();
        let id = OrderId::new(state.next_id("O"));
        state.orders.push(Order {
            id: id.clone(),
            customer_id: CustomerId::new("C0"),
            username: username.to_string(),
            product_id: ProductId::new(product_id),
            product_name: String::new(),
            unit_price: Price::ZERO,
            quantity: 1,
            total_price: Price::ZERO,
            status: OrderStatus::Submitted,
            order_date: order_date.to_string(),
        });
        id
    }

    /// Answer order creation for `product_id` with `status`.
    pub fn fail_orders_for(&self, product_id: &str, status: u16) {
        self.lock()
            .failing_orders
            .insert(ProductId::new(product_id), status);
    }

    /// Delay order creation for `product_id`.
    pub fn delay_orders_for(&self, product_id: &str, delay: Duration) {
        self.lock()
            .slow_orders
            .insert(ProductId::new(product_id), delay);
    }

    /// Answer `GET /api/{collection}` with 500.
    pub fn break_list(&self, collection: &'static str) {
        self.lock().broken_lists.insert(collection);
    }

    /// Return `{}` instead of `{"id": ...}` on creation.
    pub fn omit_created_ids(&self) {
        self.lock().omit_created_ids = true;
    }

    /// Orders the backend holds.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    /// Every `POST /api/orders` received, successful or not.
    #[must_use]
    pub fn order_attempts(&self) -> usize {
        self.lock().order_attempts
    }

    /// Uploads received so far.
    #[must_use]
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.lock().uploads.clone()
    }
}

fn fake_lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().expect("fake backend state poisoned")
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

fn broken(state: &Shared, collection: &str) -> bool {
    fake_lock(state).broken_lists.contains(collection)
}

fn created(state: &Shared, id: &str) -> Response {
    if fake_lock(state).omit_created_ids {
        return Json(json!({})).into_response();
    }
    (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
}

async fn list_customers(State(state): State<Shared>) -> Response {
    if broken(&state, "customers") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "customer store offline").into_response();
    }
    Json(fake_lock(&state).customers.clone()).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewCustomer {
    name: String,
    surname: String,
    username: String,
    email: String,
    shipping_address: String,
}

async fn create_customer(State(state): State<Shared>, Json(body): Json<NewCustomer>) -> Response {
    let id = {
        let mut s = fake_lock(&state);
        let id = s.next_id("C");
        s.customers.push(Customer {
            id: CustomerId::new(id.clone()),
            username: body.username,
            name: body.name,
            surname: body.surname,
            email: body.email,
            shipping_address: body.shipping_address,
        });
        id
    };
    created(&state, &id)
}

async fn get_customer(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let s = fake_lock(&state);
    s.customers
        .iter()
        .find(|c| c.id.as_str() == id)
        .map_or_else(not_found, |c| Json(c.clone()).into_response())
}

async fn update_customer(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<NewCustomer>,
) -> Response {
    let mut s = fake_lock(&state);
    match s.customers.iter_mut().find(|c| c.id.as_str() == id) {
        Some(customer) => {
            customer.username = body.username;
            customer.name = body.name;
            customer.surname = body.surname;
            customer.email = body.email;
            customer.shipping_address = body.shipping_address;
            StatusCode::NO_CONTENT.into_response()
        }
        None => not_found(),
    }
}

async fn delete_customer(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut s = fake_lock(&state);
    let before = s.customers.len();
    s.customers.retain(|c| c.id.as_str() != id);
    if s.customers.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_products(State(state): State<Shared>) -> Response {
    let mut products: Vec<Product> = fake_lock(&state).products.values().cloned().collect();
    products.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    Json(products).into_response()
}

async fn get_product(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    fake_lock(&state)
        .products
        .get(&ProductId::new(id))
        .map_or_else(not_found, |p| Json(p.clone()).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductBody {
    product_name: String,
    #[serde(default)]
    description: Option<String>,
    price: Price,
    stock_available: i64,
    #[serde(default)]
    image_url: Option<String>,
}

async fn update_product(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<ProductBody>,
) -> Response {
    let mut s = fake_lock(&state);
    match s.products.get_mut(&ProductId::new(id)) {
        Some(product) => {
            product.name = body.product_name;
            product.description = body.description.unwrap_or_default();
            product.unit_price = body.price;
            product.stock_available = body.stock_available;
            if let Some(image_url) = body.image_url {
                product.image_url = image_url;
            }
            StatusCode::NO_CONTENT.into_response()
        }
        None => not_found(),
    }
}

async fn delete_product(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    match fake_lock(&state).products.remove(&ProductId::new(id)) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

async fn list_orders(State(state): State<Shared>) -> Response {
    if broken(&state, "orders") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "order store offline").into_response();
    }
    Json(fake_lock(&state).orders.clone()).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewOrder {
    customer_id: String,
    product_id: String,
    quantity: i64,
}

async fn create_order(State(state): State<Shared>, Json(body): Json<NewOrder>) -> Response {
    let product_id = ProductId::new(body.product_id);
    let delay = {
        let mut s = fake_lock(&state);
        s.order_attempts += 1;
        s.slow_orders.get(&product_id).copied()
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let id = {
        let mut s = fake_lock(&state);
        if let Some(status) = s.failing_orders.get(&product_id).copied() {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, format!("cannot order {product_id}")).into_response();
        }
        let Some(customer) = s
            .customers
            .iter()
            .find(|c| c.id.as_str() == body.customer_id)
            .cloned()
        else {
            return not_found();
        };
        let Some(product) = s.products.get(&product_id).cloned() else {
            return not_found();
        };

        let id = s.next_id("O");
        s.orders.push(Order {
            id: OrderId::new(id.clone()),
            customer_id: customer.id,
            username: customer.username,
            product_id,
            product_name: product.name,
            unit_price: product.unit_price,
            quantity: body.quantity,
            total_price: Quantity::new(body.quantity)
                .ok()
                .and_then(|q| product.unit_price.checked_times(q))
                .unwrap_or(Price::ZERO),
            status: OrderStatus::Submitted,
            order_date: chrono::Utc::now().to_rfc3339(),
        });
        id
    };
    created(&state, &id)
}

async fn get_order(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    fake_lock(&state)
        .orders
        .iter()
        .find(|o| o.id.as_str() == id)
        .map_or_else(not_found, |o| Json(o.clone()).into_response())
}

async fn delete_order(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut s = fake_lock(&state);
    let before = s.orders.len();
    s.orders.retain(|o| o.id.as_str() != id);
    if s.orders.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewStatus {
    new_status: String,
}

async fn update_order_status(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<NewStatus>,
) -> Response {
    let mut s = fake_lock(&state);
    match s.orders.iter_mut().find(|o| o.id.as_str() == id) {
        Some(order) => {
            order.status = OrderStatus::from(body.new_status);
            StatusCode::NO_CONTENT.into_response()
        }
        None => not_found(),
    }
}

async fn upload_proof(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let mut upload = RecordedUpload {
        file_name: None,
        size: 0,
        order_id: None,
        customer_name: None,
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("file") => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.size = field.bytes().await.map_or(0, |b| b.len());
            }
            Some("orderId") => upload.order_id = field.text().await.ok(),
            Some("customerName") => upload.customer_name = field.text().await.ok(),
            _ => {}
        }
    }

    if upload.file_name.is_none() {
        return (StatusCode::BAD_REQUEST, "file is required").into_response();
    }

    let url = format!(
        "https://files.example.com/proofs/{}",
        upload.file_name.as_deref().unwrap_or("upload")
    );
    fake_lock(&state).uploads.push(upload);
    Json(json!({ "url": url })).into_response()
}

async fn upload_file(
    State(state): State<Shared>,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut upload = RecordedUpload {
        file_name: None,
        size: 0,
        order_id: None,
        customer_name: None,
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            upload.file_name = field.file_name().map(str::to_string);
            upload.size = field.bytes().await.map_or(0, |b| b.len());
        }
    }

    let Some(file_name) = upload.file_name.clone() else {
        return (StatusCode::BAD_REQUEST, "file is required").into_response();
    };

    fake_lock(&state).uploads.push(upload);
    Json(json!({ "url": format!("https://files.example.com/{kind}/{file_name}") })).into_response()
}

// =============================================================================
// Storefront under test
// =============================================================================

/// Storefront configuration wired to `backend`, with a lazy unused database.
#[must_use]
pub fn test_config(backend: &FakeBackend, line_timeout: Duration) -> StorefrontConfig {
    let mut config = StorefrontConfig::new(
        SecretString::from("postgres://localhost/retail_unused"),
        backend.config(Duration::from_secs(5)),
    );
    config.checkout.line_timeout = line_timeout;
    config
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
}

async fn test_login(session: Session, Json(body): Json<LoginRequest>) -> StatusCode {
    let Ok(username) = Username::parse(&body.username) else {
        return StatusCode::BAD_REQUEST;
    };
    match set_current_user(&session, &CurrentUser::new(username)).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The storefront router served on an ephemeral port.
pub struct TestStorefront {
    pub base_url: String,
    pub state: AppState,
}

impl TestStorefront {
    /// Serve the storefront against `config` and `store`.
    ///
    /// Adds `POST /test/login` taking `{"username": ...}`.
    pub async fn spawn(config: StorefrontConfig, store: Arc<dyn CartStore>) -> Self {
        let pool = PgPoolOptions::new()
            .connect_lazy(config.database_url.expose_secret())
            .expect("lazy pool");
        let backend = BackendClient::new(&config.backend).expect("backend client");
        let state = AppState::with_parts(config, pool, backend, store);

        let app = routes::routes()
            .route("/test/login", post(test_login))
            .layer(session_layer(MemoryStore::default(), false))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind storefront");
        let addr = listener.local_addr().expect("storefront address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("storefront server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// A cookie-keeping client already logged in as `username`.
    pub async fn login(&self, username: &str) -> reqwest::Client {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");
        let resp = client
            .post(format!("{}/test/login", self.base_url))
            .json(&json!({ "username": username }))
            .send()
            .await
            .expect("login request");
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);
        client
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}
