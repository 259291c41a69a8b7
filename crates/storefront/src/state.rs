//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::backend::{BackendClient, BackendError};
use crate::cart::{CartStore, PgCartStore};
use crate::config::StorefrontConfig;
use crate::services::{CartService, CheckoutService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    backend: BackendClient,
    cart: CartService,
    checkout: CheckoutService,
}

impl AppState {
    /// Create the production state: `PostgreSQL` cart store and HTTP backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, BackendError> {
        let backend = BackendClient::new(&config.backend)?;
        let store = Arc::new(PgCartStore::new(pool.clone()));
        Ok(Self::with_parts(config, pool, backend, store))
    }

    /// Create a state from already-built collaborators.
    #[must_use]
    pub fn with_parts(
        config: StorefrontConfig,
        pool: PgPool,
        backend: BackendClient,
        store: Arc<dyn CartStore>,
    ) -> Self {
        let shared = Arc::new(backend.clone());
        let cart = CartService::new(shared.clone(), Arc::clone(&store));
        let checkout = CheckoutService::new(shared, store, &config.checkout);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                backend,
                cart,
                checkout,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the remote backend client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }
}
