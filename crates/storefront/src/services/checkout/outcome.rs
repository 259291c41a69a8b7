//! Per-line and aggregate checkout results.

use serde::Serialize;

use retail_core::{OrderId, ProductId, Quantity};

use crate::backend::BackendError;

/// Classification of a failed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LineErrorKind {
    /// The product or customer no longer exists in the backend.
    NotFound,
    /// Network failure or timeout. A new checkout may succeed.
    Transport,
    /// The backend rejected or failed the order.
    Server,
    /// The request was invalid and never sent.
    Validation,
}

/// Why a line was not ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineError {
    pub kind: LineErrorKind,
    pub message: String,
}

impl LineError {
    /// Whether retrying the line in a new checkout could succeed as is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, LineErrorKind::Transport)
    }
}

impl From<&BackendError> for LineError {
    fn from(err: &BackendError) -> Self {
        let kind = match err {
            BackendError::NotFound(_) => LineErrorKind::NotFound,
            BackendError::Transport(_) => LineErrorKind::Transport,
            BackendError::Server { .. } | BackendError::Decode(_) => LineErrorKind::Server,
            BackendError::Validation(_) => LineErrorKind::Validation,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// What happened to one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LineDisposition {
    /// The backend created an order for the line.
    Ordered {
        #[serde(rename = "orderId")]
        order_id: OrderId,
    },
    /// No order was created; the line stays in the cart.
    Failed { error: LineError },
}

/// Result of submitting one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOutcome {
    pub product_id: ProductId,
    pub quantity: Quantity,
    #[serde(flatten)]
    pub disposition: LineDisposition,
}

impl OrderOutcome {
    /// Whether the line became an order.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.disposition, LineDisposition::Ordered { .. })
    }

    /// The created order, if any.
    #[must_use]
    pub const fn order_id(&self) -> Option<&OrderId> {
        match &self.disposition {
            LineDisposition::Ordered { order_id } => Some(order_id),
            LineDisposition::Failed { .. } => None,
        }
    }

    /// The failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&LineError> {
        match &self.disposition {
            LineDisposition::Ordered { .. } => None,
            LineDisposition::Failed { error } => Some(error),
        }
    }
}

/// Overall disposition of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckoutStatus {
    /// Every line became an order.
    Ordered,
    /// Some lines became orders, the rest are still in the cart.
    PartiallyOrdered,
    /// No line became an order; the cart is unchanged.
    NothingOrdered,
}

/// Aggregate result of a checkout that reached submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    /// Lines submitted (always every line in the cart).
    pub submitted_count: usize,
    /// Lines that became orders.
    pub succeeded_count: usize,
    /// Lines that did not, in cart order.
    pub failed_lines: Vec<OrderOutcome>,
    /// Lines that did, in cart order.
    pub placed_orders: Vec<OrderOutcome>,
    /// Set when ordered lines could not be removed from the cart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation_error: Option<String>,
}

impl CheckoutResult {
    /// Split outcomes into placed and failed lines.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<OrderOutcome>, reconciliation_error: Option<String>) -> Self {
        let submitted_count = outcomes.len();
        let (placed_orders, failed_lines): (Vec<_>, Vec<_>) =
            outcomes.into_iter().partition(OrderOutcome::is_success);

        Self {
            submitted_count,
            succeeded_count: placed_orders.len(),
            failed_lines,
            placed_orders,
            reconciliation_error,
        }
    }

    /// Overall disposition.
    #[must_use]
    pub const fn status(&self) -> CheckoutStatus {
        if self.succeeded_count == 0 {
            CheckoutStatus::NothingOrdered
        } else if self.succeeded_count == self.submitted_count {
            CheckoutStatus::Ordered
        } else {
            CheckoutStatus::PartiallyOrdered
        }
    }
}
