//! reqwest implementation of the backend client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use retail_core::{CustomerId, OrderId, OrderStatus, ProductId, Username};

use super::types::{
    Customer, CustomerInput, FileUpload, IdEnvelope, Order, OrderRequest, OrderStatusUpdate,
    Product, ProductInput, UrlEnvelope,
};
use super::{Backend, BackendError};
use crate::config::BackendConfig;

/// Header carrying the backend function key.
const API_KEY_HEADER: &str = "x-functions-key";

/// Longest error body kept in [`BackendError::Server`].
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Client for the remote retail backend.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();

        if let Some(key) = &config.api_key {
            let mut value = HeaderValue::from_str(key.expose_secret())
                .map_err(|e| BackendError::Validation(format!("Invalid API key format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// The base URL resource paths are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Customers
    // ─────────────────────────────────────────────────────────────────────────

    /// List all customers.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_customers(&self) -> Result<Vec<Customer>, BackendError> {
        self.list(&["customers"]).await
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the customer does not exist.
    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn get_customer(&self, id: &CustomerId) -> Result<Customer, BackendError> {
        self.get(&["customers", id.as_str()]).await
    }

    /// Create a customer and return its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no ID.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create_customer(&self, input: &CustomerInput) -> Result<CustomerId, BackendError> {
        self.create(&["customers"], input).await.map(CustomerId::new)
    }

    /// Replace a customer.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the customer does not exist.
    #[instrument(skip(self, input), fields(customer_id = %id))]
    pub async fn update_customer(
        &self,
        id: &CustomerId,
        input: &CustomerInput,
    ) -> Result<(), BackendError> {
        self.put(&["customers", id.as_str()], input).await
    }

    /// Delete a customer. Deleting a missing customer succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn delete_customer(&self, id: &CustomerId) -> Result<(), BackendError> {
        self.delete(&["customers", id.as_str()]).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Products
    // ─────────────────────────────────────────────────────────────────────────

    /// List all products.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        self.list(&["products"]).await
    }

    /// Create a product and return its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no ID.
    #[instrument(skip(self, input), fields(name = %input.product_name))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<ProductId, BackendError> {
        self.create(&["products"], input).await.map(ProductId::new)
    }

    /// Replace a product.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the product does not exist.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: &ProductId,
        input: &ProductInput,
    ) -> Result<(), BackendError> {
        self.put(&["products", id.as_str()], input).await
    }

    /// Delete a product. Deleting a missing product succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), BackendError> {
        self.delete(&["products", id.as_str()]).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    /// List all orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, BackendError> {
        self.list(&["orders"]).await
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the order does not exist.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: &OrderId) -> Result<Order, BackendError> {
        self.get(&["orders", id.as_str()]).await
    }

    /// Change an order's status.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the order does not exist.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&["orders", id.as_str(), "status"])?;
        let body = OrderStatusUpdate { new_status: status };
        let response = self.inner.client.post(url).json(&body).send().await?;
        success_body(&format!("orders/{id}/status"), response).await?;
        Ok(())
    }

    /// Delete an order. Deleting a missing order succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn delete_order(&self, id: &OrderId) -> Result<(), BackendError> {
        self.delete(&["orders", id.as_str()]).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Uploads
    // ─────────────────────────────────────────────────────────────────────────

    /// Upload a proof of payment and return its stored URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails or the response has no URL.
    #[instrument(
        skip(self, file),
        fields(file_name = %file.file_name, size = file.bytes.len())
    )]
    pub async fn upload_proof(
        &self,
        file: FileUpload,
        order_id: Option<&OrderId>,
        customer_name: Option<&str>,
    ) -> Result<String, BackendError> {
        let mut form = Form::new().part("file", file_part(file)?);
        if let Some(order_id) = order_id {
            form = form.text("orderId", order_id.to_string());
        }
        if let Some(name) = customer_name.filter(|n| !n.trim().is_empty()) {
            form = form.text("customerName", name.to_string());
        }

        self.upload(&["proofs", "upload"], form).await
    }

    /// Upload a file to an arbitrary upload endpoint, e.g. `uploads/images`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] for an empty path, otherwise an
    /// error if the upload fails or the response has no URL.
    #[instrument(skip(self, file), fields(file_name = %file.file_name))]
    pub async fn upload_file(
        &self,
        relative_url: &str,
        file: FileUpload,
    ) -> Result<String, BackendError> {
        let segments: Vec<&str> = relative_url.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(BackendError::Validation("upload path is required".to_string()));
        }

        let form = Form::new().part("file", file_part(file)?);
        self.upload(&segments, form).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve resource path segments against the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::Validation("backend URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, BackendError> {
        let url = self.endpoint(segments)?;
        let response = self.inner.client.get(url).send().await?;
        read_json(&segments.join("/"), response).await
    }

    /// GET a collection; a missing collection is empty.
    async fn list<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>, BackendError> {
        match self.get(segments).await {
            Err(BackendError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    async fn create<B: Serialize + Sync>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<String, BackendError> {
        let url = self.endpoint(segments)?;
        let response = self.inner.client.post(url).json(body).send().await?;
        let resource = segments.join("/");
        let envelope: IdEnvelope = read_json(&resource, response).await?;

        envelope
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| BackendError::Decode(format!("{resource}: response has no id")))
    }

    async fn put<B: Serialize + Sync>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(segments)?;
        let response = self.inner.client.put(url).json(body).send().await?;
        success_body(&segments.join("/"), response).await?;
        Ok(())
    }

    async fn delete(&self, segments: &[&str]) -> Result<(), BackendError> {
        let url = self.endpoint(segments)?;
        let response = self.inner.client.delete(url).send().await?;
        match success_body(&segments.join("/"), response).await {
            Ok(_) | Err(BackendError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn upload(&self, segments: &[&str], form: Form) -> Result<String, BackendError> {
        let url = self.endpoint(segments)?;
        let response = self.inner.client.post(url).multipart(form).send().await?;
        let resource = segments.join("/");
        let envelope: UrlEnvelope = read_json(&resource, response).await?;

        envelope
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| BackendError::Decode(format!("{resource}: response has no url")))
    }
}

#[async_trait]
impl Backend for BackendClient {
    /// Lists every customer and matches the username exactly; the backend
    /// has no username index.
    #[instrument(skip(self), fields(username = %username))]
    async fn get_customer_by_username(
        &self,
        username: &Username,
    ) -> Result<Customer, BackendError> {
        self.list_customers()
            .await?
            .into_iter()
            .find(|c| c.username == username.as_str())
            .ok_or_else(|| BackendError::NotFound(format!("customer '{username}'")))
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: &ProductId) -> Result<Product, BackendError> {
        self.get(&["products", product_id.as_str()]).await
    }

    /// Blank customer or product IDs are rejected before any network call.
    #[instrument(
        skip(self, request),
        fields(product_id = %request.product_id, quantity = %request.quantity)
    )]
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderId, BackendError> {
        if request.customer_id.is_blank() {
            return Err(BackendError::Validation("customer ID is required".to_string()));
        }
        if request.product_id.is_blank() {
            return Err(BackendError::Validation("product ID is required".to_string()));
        }

        self.create(&["orders"], request).await.map(OrderId::new)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response handling
// ─────────────────────────────────────────────────────────────────────────────

/// Check the status and return the body text of a successful response.
async fn success_body(resource: &str, response: reqwest::Response) -> Result<String, BackendError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::NotFound(resource.to_string()));
    }

    let body = response.text().await?;
    if !status.is_success() {
        return Err(BackendError::Server {
            status: status.as_u16(),
            message: truncate_body(&body),
        });
    }

    Ok(body)
}

async fn read_json<T: DeserializeOwned>(
    resource: &str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let body = success_body(resource, response).await?;
    serde_json::from_str(&body).map_err(|e| BackendError::Decode(format!("{resource}: {e}")))
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    out.push('…');
    out
}

fn file_part(file: FileUpload) -> Result<Part, BackendError> {
    let content_type = file
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Part::bytes(file.bytes)
        .file_name(file.file_name)
        .mime_str(&content_type)
        .map_err(|e| BackendError::Validation(format!("Invalid content type: {e}")))
}
