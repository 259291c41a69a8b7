//! Remote backend client.
//!
//! # Architecture
//!
//! - The backend is a black-box JSON-over-HTTP service exposing the
//!   `customers`, `products` and `orders` collections plus multipart uploads
//! - The backend is source of truth - NO local copy, direct API calls, no caching
//! - One network round trip per call, no internal retry
//! - Failures surface as a typed [`BackendError`]; `404` is always [`BackendError::NotFound`]
//!
//! The checkout core only needs three operations, which form the [`Backend`]
//! trait. [`BackendClient`] implements the trait and exposes the rest of the
//! CRUD surface as inherent methods.
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_storefront::backend::{Backend, BackendClient, OrderRequest};
//!
//! let client = BackendClient::new(&config.backend)?;
//!
//! let customer = client.get_customer_by_username(&owner).await?;
//! let order_id = client
//!     .create_order(&OrderRequest {
//!         customer_id: customer.id,
//!         product_id: ProductId::new("P1"),
//!         quantity: Quantity::ONE,
//!     })
//!     .await?;
//! ```

mod client;
pub mod types;

pub use client::BackendClient;
pub use types::*;

use async_trait::async_trait;
use retail_core::{OrderId, ProductId, Username};
use thiserror::Error;

/// Errors that can occur when calling the remote backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The resource does not exist (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection failure, timeout or interrupted body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },

    /// The request was rejected locally before any network call.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A success response did not contain the expected representation.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether a new attempt could succeed without changing the request.
    ///
    /// Only transport failures qualify; nothing is retried automatically.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether this is a not-found outcome.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport("request timed out".to_string())
        } else if err.is_decode() {
            Self::Decode(err.without_url().to_string())
        } else {
            Self::Transport(err.without_url().to_string())
        }
    }
}

/// The backend operations the cart and checkout core depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Resolve an owner identity to the backend customer record.
    async fn get_customer_by_username(&self, username: &Username)
    -> Result<Customer, BackendError>;

    /// Fetch a product.
    async fn get_product(&self, product_id: &ProductId) -> Result<Product, BackendError>;

    /// Create one order and return its id.
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderId, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::NotFound("products/P1".to_string());
        assert_eq!(err.to_string(), "Not found: products/P1");

        let err = BackendError::Server {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned 500: boom");
    }

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(BackendError::Transport("reset".to_string()).is_retryable());
        assert!(!BackendError::NotFound(String::new()).is_retryable());
        assert!(
            !BackendError::Server {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!BackendError::Validation(String::new()).is_retryable());
        assert!(!BackendError::Decode(String::new()).is_retryable());
    }
}
