//! Checkout error types.

use thiserror::Error;

use retail_core::Username;

use crate::backend::BackendError;
use crate::cart::CartStoreError;

/// Failures that stop a checkout before any order is submitted.
///
/// Once submission has begun, per-line failures are reported in the
/// [`CheckoutResult`](super::CheckoutResult) instead.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No backend customer has the owner's username.
    #[error("no customer record for {0}")]
    CustomerNotFound(Username),

    /// The owner's cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// The customer lookup failed for a reason other than not-found.
    #[error("customer lookup failed: {0}")]
    CustomerLookup(#[source] BackendError),

    /// The cart could not be read.
    #[error("cart store error: {0}")]
    CartStore(#[from] CartStoreError),
}
