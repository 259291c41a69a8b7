//! Resource representations exchanged with the remote backend.
//!
//! Field names follow the backend's camelCase JSON.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use retail_core::{CustomerId, OrderId, OrderStatus, Price, ProductId, Quantity};

// =============================================================================
// Customers
// =============================================================================

/// A backend customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Backend customer ID.
    pub id: CustomerId,
    /// Login name; matches the storefront owner identity.
    pub username: String,
    /// Given name.
    #[serde(default)]
    pub name: String,
    /// Family name.
    #[serde(default)]
    pub surname: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Where orders are shipped.
    #[serde(default)]
    pub shipping_address: String,
}

/// Body for creating or replacing a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    pub name: String,
    pub surname: String,
    pub username: String,
    pub email: String,
    pub shipping_address: String,
}

// =============================================================================
// Products
// =============================================================================

/// A backend product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Backend product ID.
    pub id: ProductId,
    /// Display name.
    #[serde(rename = "productName")]
    pub name: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Price of one unit.
    #[serde(rename = "price")]
    pub unit_price: Price,
    /// Units in stock according to the backend.
    #[serde(default)]
    pub stock_available: i64,
    /// Product image location.
    #[serde(default)]
    pub image_url: String,
}

/// Body for creating or replacing a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Price,
    pub stock_available: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// A backend order. One order covers exactly one product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    /// Username of the customer at the time of ordering.
    #[serde(default)]
    pub username: String,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub unit_price: Price,
    pub quantity: i64,
    #[serde(default)]
    pub total_price: Price,
    pub status: OrderStatus,
    /// Timestamp text exactly as stored by the backend.
    #[serde(default)]
    pub order_date: String,
}

impl Order {
    /// Parse [`Order::order_date`].
    ///
    /// Accepts RFC 3339 and the offset-less ISO form, which is read as UTC.
    #[must_use]
    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.order_date.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }
}

/// The unit of work submitted per cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// Body for `POST orders/{id}/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdate {
    pub new_status: OrderStatus,
}

// =============================================================================
// Uploads
// =============================================================================

/// A file to send as the `file` part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Original file name.
    pub file_name: String,
    /// MIME type; `application/octet-stream` when unknown.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

// =============================================================================
// Envelopes
// =============================================================================

/// `{ "id": ... }` returned on creation.
#[derive(Debug, Deserialize)]
pub(crate) struct IdEnvelope {
    pub id: Option<String>,
}

/// `{ "url": ... }` returned on upload.
#[derive(Debug, Deserialize)]
pub(crate) struct UrlEnvelope {
    pub url: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_from_backend_json() {
        let json = r#"{
            "id": "P1",
            "productName": "Espresso Cup",
            "description": "Porcelain",
            "price": 12.5,
            "stockAvailable": 40,
            "imageUrl": "https://cdn.example.net/cup.png"
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, ProductId::new("P1"));
        assert_eq!(product.name, "Espresso Cup");
        assert_eq!(product.unit_price.to_string(), "12.50");
        assert_eq!(product.stock_available, 40);
    }

    #[test]
    fn test_customer_tolerates_missing_optional_fields() {
        let customer: Customer =
            serde_json::from_str(r#"{"id":"C1","username":"alice"}"#).unwrap();
        assert_eq!(customer.id, CustomerId::new("C1"));
        assert!(customer.shipping_address.is_empty());
    }

    #[test]
    fn test_order_request_wire_format() {
        let request = OrderRequest {
            customer_id: CustomerId::new("C1"),
            product_id: ProductId::new("P1"),
            quantity: Quantity::new(2).unwrap(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"customerId": "C1", "productId": "P1", "quantity": 2})
        );
    }

    #[test]
    fn test_order_placed_at() {
        let mut order: Order = serde_json::from_str(
            r#"{"id":"O1","customerId":"C1","productId":"P1","quantity":1,
                "status":"Submitted","orderDate":"2025-03-01T10:15:00Z"}"#,
        )
        .unwrap();
        assert_eq!(order.placed_at().unwrap().to_rfc3339(), "2025-03-01T10:15:00+00:00");

        order.order_date = "2025-03-01T10:15:00.123".to_string();
        assert!(order.placed_at().is_some());

        order.order_date = "yesterday".to_string();
        assert!(order.placed_at().is_none());
    }

    #[test]
    fn test_status_update_wire_format() {
        let body = OrderStatusUpdate {
            new_status: OrderStatus::Processing,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"newStatus":"Processing"}"#
        );
    }
}
