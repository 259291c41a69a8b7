//! Checkout: turn an owner's cart into backend orders.
//!
//! The backend has no multi-order transaction, so each cart line becomes its
//! own order and checkout is not all-or-nothing. What it does guarantee:
//!
//! - Every line is attempted exactly once per checkout, whatever happens to
//!   the others
//! - A line either became an order and left the cart, or it is still in the
//!   cart
//! - The [`CheckoutResult`] reports each line's disposition
//!
//! # Flow
//!
//! ```text
//! resolve customer ──not found──▶ CustomerNotFound (cart untouched)
//!        │
//! load cart lines ──empty──▶ EmptyCart
//!        │
//! submit every line (bounded concurrency, per-line timeout)
//!        │
//! clear exactly the ordered lines
//!        │
//! CheckoutResult (also when every line failed)
//! ```

mod error;
mod outcome;

pub use error::CheckoutError;
pub use outcome::{
    CheckoutResult, CheckoutStatus, LineDisposition, LineError, LineErrorKind, OrderOutcome,
};

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use tracing::instrument;

use retail_core::{CustomerId, Username};

use crate::backend::{Backend, BackendError, OrderRequest};
use crate::cart::{CartLine, CartStore};
use crate::config::CheckoutConfig;

/// Message returned to the caller when ordered lines could not be cleared.
const RECONCILIATION_FAILED: &str =
    "Your order was placed but some ordered items could not be removed from your cart";

/// Checkout orchestrator.
#[derive(Clone)]
pub struct CheckoutService {
    backend: Arc<dyn Backend>,
    store: Arc<dyn CartStore>,
    line_timeout: Duration,
    max_concurrency: usize,
}

impl CheckoutService {
    /// Create a new checkout service.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn CartStore>, config: &CheckoutConfig) -> Self {
        Self {
            backend,
            store,
            line_timeout: config.line_timeout,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Check out the owner's cart.
    ///
    /// The caller must already have authenticated `owner`.
    ///
    /// # Errors
    ///
    /// Fails only before anything is submitted:
    /// - [`CheckoutError::CustomerNotFound`] if no backend customer has the
    ///   owner's username
    /// - [`CheckoutError::CustomerLookup`] if that lookup fails otherwise
    /// - [`CheckoutError::CartStore`] if the cart cannot be read
    /// - [`CheckoutError::EmptyCart`] if there is nothing to order
    ///
    /// Line failures and a failed cart cleanup are reported in the result.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn checkout(&self, owner: &Username) -> Result<CheckoutResult, CheckoutError> {
        let customer = match self.backend.get_customer_by_username(owner).await {
            Ok(customer) => customer,
            Err(BackendError::NotFound(_)) => {
                return Err(CheckoutError::CustomerNotFound(owner.clone()));
            }
            Err(e) => return Err(CheckoutError::CustomerLookup(e)),
        };

        let lines = self.store.list_lines(owner).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        tracing::info!(
            customer_id = %customer.id,
            lines = lines.len(),
            "Checkout started"
        );

        let outcomes = self.submit_lines(&customer.id, &lines).await;

        let ordered: Vec<CartLine> = outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| CartLine {
                owner: owner.clone(),
                product_id: o.product_id.clone(),
                quantity: o.quantity,
            })
            .collect();

        let reconciliation_error = if ordered.is_empty() {
            None
        } else {
            match self.store.clear(owner, &ordered).await {
                Ok(()) => None,
                Err(e) => {
                    let event_id = sentry::capture_error(&e);
                    tracing::error!(
                        error = %e,
                        sentry_event_id = %event_id,
                        ordered = ordered.len(),
                        "Failed to remove ordered lines from cart"
                    );
                    Some(RECONCILIATION_FAILED.to_string())
                }
            }
        };

        let result = CheckoutResult::from_outcomes(outcomes, reconciliation_error);

        tracing::info!(
            submitted = result.submitted_count,
            succeeded = result.succeeded_count,
            failed = result.failed_lines.len(),
            status = ?result.status(),
            "Checkout finished"
        );

        Ok(result)
    }

    /// Submit one order per line and collect every outcome, in cart order.
    async fn submit_lines(&self, customer_id: &CustomerId, lines: &[CartLine]) -> Vec<OrderOutcome> {
        // Futures are built up front so the stream closure does not borrow a
        // line; a borrowing closure makes the checkout future non-Send.
        let pending: Vec<_> = lines
            .iter()
            .enumerate()
            .map(|(index, line)| async move {
                let outcome = self.submit_line(customer_id, line).await;
                (index, outcome)
            })
            .collect();

        let mut indexed: Vec<(usize, OrderOutcome)> = stream::iter(pending)
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn submit_line(&self, customer_id: &CustomerId, line: &CartLine) -> OrderOutcome {
        let request = OrderRequest {
            customer_id: customer_id.clone(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
        };

        let result = tokio::time::timeout(self.line_timeout, self.backend.create_order(&request))
            .await
            .unwrap_or_else(|_| {
                Err(BackendError::Transport(format!(
                    "no response within {:?}",
                    self.line_timeout
                )))
            });

        let disposition = match result {
            Ok(order_id) => {
                tracing::debug!(product_id = %line.product_id, order_id = %order_id, "Line ordered");
                LineDisposition::Ordered { order_id }
            }
            Err(e) => {
                let error = LineError::from(&e);
                tracing::warn!(
                    product_id = %line.product_id,
                    kind = ?error.kind,
                    error = %e,
                    "Line failed"
                );
                LineDisposition::Failed { error }
            }
        };

        OrderOutcome {
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            disposition,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
