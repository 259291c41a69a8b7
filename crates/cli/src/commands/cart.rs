//! Cart maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! retail-cli cart show --owner alice
//! retail-cli cart clear --owner alice
//! retail-cli cart checkout --owner alice
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for storefront
//! - `BACKEND_BASE_URL`, `BACKEND_API_KEY`, `BACKEND_TIMEOUT_SECS` - for `checkout`
//! - `CHECKOUT_LINE_TIMEOUT_SECS`, `CHECKOUT_MAX_CONCURRENCY` - for `checkout`

use std::sync::Arc;

use retail_core::{Username, UsernameError};
use retail_storefront::backend::{BackendClient, BackendError};
use retail_storefront::cart::{CartStore, CartStoreError, PgCartStore};
use retail_storefront::config::{BackendConfig, CheckoutConfig, ConfigError};
use retail_storefront::db;
use retail_storefront::services::{CheckoutError, CheckoutService};
use thiserror::Error;
use tracing::{info, warn};

use super::MissingEnvVar;

/// Errors that can occur during cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// Required environment variable is missing.
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVar),

    /// Invalid owner username.
    #[error("Invalid owner: {0}")]
    InvalidOwner(#[from] UsernameError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cart store error.
    #[error("Cart store error: {0}")]
    Store(#[from] CartStoreError),

    /// Invalid backend or checkout settings.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend client could not be built.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Checkout stopped before submitting anything.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),
}

async fn open_store() -> Result<PgCartStore, CartCommandError> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    Ok(PgCartStore::new(pool))
}

/// Print every line of `owner`'s cart.
///
/// # Errors
///
/// Returns an error if the owner is invalid or the database is unreachable.
pub async fn show(owner: &str) -> Result<(), CartCommandError> {
    let owner = Username::parse(owner)?;
    let store = open_store().await?;

    let lines = store.list_lines(&owner).await?;
    if lines.is_empty() {
        info!("Cart for {} is empty", owner);
        return Ok(());
    }

    info!("Cart for {} ({} lines):", owner, lines.len());
    for line in &lines {
        info!("  {} x {}", line.product_id, line.quantity);
    }

    Ok(())
}

/// Remove every line of `owner`'s cart.
///
/// # Errors
///
/// Returns an error if the owner is invalid or the database is unreachable.
pub async fn clear(owner: &str) -> Result<(), CartCommandError> {
    let owner = Username::parse(owner)?;
    let store = open_store().await?;

    let lines = store.list_lines(&owner).await?;
    store.clear(&owner, &lines).await?;

    info!("Cleared {} lines from the cart of {}", lines.len(), owner);
    Ok(())
}

/// Check out `owner`'s cart against the configured backend.
///
/// # Errors
///
/// Returns an error if configuration is invalid or checkout stops before
/// submitting anything. Failed lines are reported, not returned as errors.
pub async fn checkout(owner: &str) -> Result<(), CartCommandError> {
    let owner = Username::parse(owner)?;
    let store: Arc<dyn CartStore> = Arc::new(open_store().await?);

    let backend_config = BackendConfig::from_env()?;
    let checkout_config = CheckoutConfig::from_env(backend_config.timeout)?;
    let backend = Arc::new(BackendClient::new(&backend_config)?);

    let service = CheckoutService::new(backend, store, &checkout_config);
    let result = service.checkout(&owner).await?;

    info!(
        "Checkout for {}: {:?}, {} of {} lines ordered",
        owner,
        result.status(),
        result.succeeded_count,
        result.submitted_count
    );
    for outcome in &result.placed_orders {
        if let Some(order_id) = outcome.order_id() {
            info!("  ordered {} x {} as {}", outcome.product_id, outcome.quantity, order_id);
        }
    }
    for outcome in &result.failed_lines {
        if let Some(error) = outcome.error() {
            warn!(
                "  failed {} x {}: {:?} {}",
                outcome.product_id, outcome.quantity, error.kind, error.message
            );
        }
    }
    if let Some(reconciliation) = &result.reconciliation_error {
        warn!("  {}", reconciliation);
    }

    Ok(())
}
