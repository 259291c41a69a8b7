//! Cart entry points used by the HTTP layer.
//!
//! Mutations go straight to the [`CartStore`]. Product data is fetched from
//! the backend on every view and never stored.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use retail_core::{Price, ProductId, Quantity, Username};

use crate::backend::{Backend, BackendError};
use crate::cart::{CartLine, CartStore, CartStoreError, QuantityUpdate};

/// How many product lookups a cart view runs at once.
const VIEW_LOOKUP_CONCURRENCY: usize = 8;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist in the backend.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Cart store failed.
    #[error("cart store error: {0}")]
    Store(#[from] CartStoreError),

    /// A line total or the subtotal does not fit in a price.
    #[error("cart total overflowed at product {0}")]
    TotalOverflow(ProductId),
}

/// A cart line joined with current product data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartViewLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: String,
    pub unit_price: Price,
    pub quantity: Quantity,
    pub line_total: Price,
}

/// The owner's cart as shown to them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartViewLine>,
    /// Sum of all line totals.
    pub subtotal: Price,
    /// Sum of all quantities.
    pub item_count: u64,
}

/// Cart operations for an authenticated owner.
#[derive(Clone)]
pub struct CartService {
    backend: Arc<dyn Backend>,
    store: Arc<dyn CartStore>,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn CartStore>) -> Self {
        Self { backend, store }
    }

    /// Add one unit of a product after confirming it exists.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ProductNotFound`] if the backend does not know the
    /// product; the cart is not touched in that case.
    #[instrument(skip(self), fields(owner = %owner, product_id = %product_id))]
    pub async fn add(&self, owner: &Username, product_id: &ProductId) -> Result<CartLine, CartError> {
        match self.backend.get_product(product_id).await {
            Ok(_) => {}
            Err(BackendError::NotFound(_)) => {
                return Err(CartError::ProductNotFound(product_id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(self.store.add_or_increment(owner, product_id).await?)
    }

    /// Overwrite quantities of existing lines; zero or below removes a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a quantity is too large.
    #[instrument(skip(self, updates), fields(owner = %owner))]
    pub async fn update(&self, owner: &Username, updates: &[QuantityUpdate]) -> Result<(), CartError> {
        Ok(self.store.set_quantities(owner, updates).await?)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self), fields(owner = %owner, product_id = %product_id))]
    pub async fn remove(&self, owner: &Username, product_id: &ProductId) -> Result<(), CartError> {
        Ok(self.store.remove(owner, product_id).await?)
    }

    /// The cart joined with current product names and prices.
    ///
    /// Lines whose product no longer exists are left out of the view but
    /// stay in the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails, a product lookup fails for a
    /// reason other than not-found, or the totals overflow.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn view(&self, owner: &Username) -> Result<CartView, CartError> {
        let lines = self.store.list_lines(owner).await?;

        let enriched: Vec<Option<CartViewLine>> = stream::iter(lines)
            .map(|line| {
                let backend = Arc::clone(&self.backend);
                async move {
                    match backend.get_product(&line.product_id).await {
                        Ok(product) => {
                            let Some(line_total) = product.unit_price.checked_times(line.quantity)
                            else {
                                return Err(CartError::TotalOverflow(line.product_id));
                            };
                            Ok(Some(CartViewLine {
                                line_total,
                                product_id: line.product_id,
                                product_name: product.name,
                                image_url: product.image_url,
                                unit_price: product.unit_price,
                                quantity: line.quantity,
                            }))
                        }
                        Err(BackendError::NotFound(_)) => {
                            tracing::debug!(
                                product_id = %line.product_id,
                                "Skipping cart line for missing product"
                            );
                            Ok(None)
                        }
                        Err(e) => Err(CartError::Backend(e)),
                    }
                }
            })
            .buffered(VIEW_LOOKUP_CONCURRENCY)
            .try_collect()
            .await?;

        let lines: Vec<CartViewLine> = enriched.into_iter().flatten().collect();
        let mut subtotal = Price::ZERO;
        for line in &lines {
            subtotal = subtotal
                .checked_add(line.line_total)
                .ok_or_else(|| CartError::TotalOverflow(line.product_id.clone()))?;
        }
        let item_count: u64 = lines.iter().map(|l| u64::from(l.quantity.get())).sum();

        Ok(CartView {
            lines,
            subtotal,
            item_count,
        })
    }
}
