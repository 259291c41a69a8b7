//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::backend::BackendError;
use crate::cart::CartStoreError;
use crate::services::{CartError, CheckoutError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Remote backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout stopped before submitting anything.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource belongs to someone else.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Backend(err) | Self::Cart(CartError::Backend(err)) => backend_status(err),
            Self::Cart(CartError::ProductNotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cart(CartError::Store(err)) | Self::Checkout(CheckoutError::CartStore(err)) => {
                store_status(err)
            }
            Self::Checkout(CheckoutError::CustomerNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Checkout(CheckoutError::EmptyCart) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Checkout(CheckoutError::CustomerLookup(_))
            | Self::Cart(CartError::TotalOverflow(_)) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Backend(err) | Self::Cart(CartError::Backend(err)) => match err {
                BackendError::NotFound(_) => "Not found".to_string(),
                BackendError::Validation(msg) => msg.clone(),
                _ => "External service error".to_string(),
            },
            Self::Cart(CartError::ProductNotFound(id)) => format!("Product {id} not found"),
            Self::Cart(CartError::Store(CartStoreError::QuantityOverflow(id)))
            | Self::Checkout(CheckoutError::CartStore(CartStoreError::QuantityOverflow(id))) => {
                format!("Quantity for product {id} is too large")
            }
            Self::Checkout(CheckoutError::CustomerNotFound(_)) => {
                "No customer account is linked to this user".to_string()
            }
            Self::Checkout(CheckoutError::EmptyCart) => "Your cart is empty".to_string(),
            Self::Checkout(CheckoutError::CustomerLookup(_))
            | Self::Cart(CartError::TotalOverflow(_)) => "External service error".to_string(),
            Self::Cart(CartError::Store(_)) | Self::Checkout(CheckoutError::CartStore(_)) => {
                "Internal server error".to_string()
            }
            Self::NotFound(_) | Self::Unauthorized(_) | Self::Forbidden(_) | Self::BadRequest(_) => {
                self.to_string()
            }
        }
    }
}

const fn backend_status(err: &BackendError) -> StatusCode {
    match err {
        BackendError::NotFound(_) => StatusCode::NOT_FOUND,
        BackendError::Validation(_) => StatusCode::BAD_REQUEST,
        BackendError::Transport(_) | BackendError::Server { .. } | BackendError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

const fn store_status(err: &CartStoreError) -> StatusCode {
    match err {
        CartStoreError::QuantityOverflow(_) => StatusCode::BAD_REQUEST,
        CartStoreError::Database(_)
        | CartStoreError::Unavailable(_)
        | CartStoreError::DataCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server-side failures to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "P1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use retail_core::{ProductId, Username};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order O1".to_string());
        assert_eq!(err.to_string(), "Not found: order O1");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_backend_status_codes() {
        assert_eq!(
            get_status(BackendError::NotFound("x".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(BackendError::Transport("x".to_string()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(
                BackendError::Server {
                    status: 500,
                    message: "x".to_string()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(BackendError::Validation("x".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_cart_and_checkout_status_codes() {
        assert_eq!(
            get_status(CartError::ProductNotFound(ProductId::new("P1")).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartError::Store(CartStoreError::QuantityOverflow(ProductId::new("P1"))).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartError::Store(CartStoreError::Unavailable("x".to_string())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::CustomerNotFound(Username::parse("alice").unwrap()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("x".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("x".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::from(BackendError::Server {
            status: 500,
            message: "stack trace with secrets".to_string(),
        });
        assert_eq!(err.public_message(), "External service error");

        let err = AppError::from(CartError::Store(CartStoreError::Unavailable(
            "connection string".to_string(),
        )));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::from(CartError::TotalOverflow(ProductId::new("P1")));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.public_message(), "External service error");
    }
}
