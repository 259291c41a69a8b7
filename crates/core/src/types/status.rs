//! Order status as reported by the remote backend.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a backend order.
///
/// The backend stores the status as free text; values this crate does not
/// know about are kept verbatim in [`OrderStatus::Other`] so that a status
/// update round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// Accepted by the backend, not yet processed.
    Submitted,
    /// Being picked and packed.
    Processing,
    /// Delivered or otherwise finished.
    Completed,
    /// Cancelled by an administrator.
    Cancelled,
    /// Any other status text.
    Other(String),
}

impl OrderStatus {
    /// The wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Submitted => "Submitted",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Other(s) => s,
        }
    }

    /// Whether the order can no longer change.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "submitted" => Self::Submitted,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(value),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses_are_case_insensitive() {
        let status: OrderStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, OrderStatus::Processing);
        let status: OrderStatus = serde_json::from_str("\"Canceled\"").unwrap();
        assert_eq!(status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_unknown_status_round_trips() {
        let status: OrderStatus = serde_json::from_str("\"Awaiting Payment\"").unwrap();
        assert_eq!(status, OrderStatus::Other("Awaiting Payment".to_string()));
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            "\"Awaiting Payment\""
        );
    }

    #[test]
    fn test_is_final() {
        assert!(OrderStatus::Completed.is_final());
        assert!(OrderStatus::Cancelled.is_final());
        assert!(!OrderStatus::Submitted.is_final());
    }
}
