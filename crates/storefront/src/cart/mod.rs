//! Local cart storage.
//!
//! A cart is a set of `(owner, product) -> quantity` lines. It is independent
//! of the remote backend: products are referenced by ID only and nothing about
//! them is stored here.
//!
//! # Invariants
//!
//! - A stored quantity is always at least 1 ([`Quantity`] cannot hold less)
//! - Lines are unique per `(owner, product)`
//! - Every mutation is serialised per owner, so [`CartStore::clear`] after a
//!   checkout cannot erase a line added while the checkout was in flight
//!
//! # Implementations
//!
//! - [`PgCartStore`] - `PostgreSQL`, used by the running storefront
//! - [`MemoryCartStore`] - in-process, one lock per owner

mod memory;
mod postgres;

pub use memory::MemoryCartStore;
pub use postgres::PgCartStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use retail_core::{ProductId, Quantity, Username};

/// One product line in an owner's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Cart owner.
    pub owner: Username,
    /// Backend product ID.
    pub product_id: ProductId,
    /// Units of the product.
    pub quantity: Quantity,
}

/// A requested quantity change for one product.
///
/// The quantity is raw user input: zero or below removes the line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityUpdate {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Errors that can occur in a cart store.
#[derive(Debug, Error)]
pub enum CartStoreError {
    /// Database query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store cannot be used (e.g. a poisoned lock).
    #[error("Cart store unavailable: {0}")]
    Unavailable(String),

    /// The resulting quantity would not fit the quantity column.
    #[error("Quantity for product {0} would exceed the maximum of {max}", max = Quantity::MAX)]
    QuantityOverflow(ProductId),

    /// Stored data violates a cart invariant.
    #[error("Data corruption: {0}")]
    DataCorruption(String),
}

/// Per-owner cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Add one unit of `product_id`, creating the line with quantity 1 if it
    /// does not exist. Returns the line after the change.
    async fn add_or_increment(
        &self,
        owner: &Username,
        product_id: &ProductId,
    ) -> Result<CartLine, CartStoreError>;

    /// Overwrite the quantity of existing lines.
    ///
    /// A quantity of zero or below removes the line. Products without a line
    /// are ignored and lines not mentioned are left alone.
    ///
    /// The whole batch is validated before the store is read, so a quantity
    /// above [`Quantity::MAX`] fails the batch with
    /// [`CartStoreError::QuantityOverflow`] even when its product has no
    /// line, and nothing changes.
    async fn set_quantities(
        &self,
        owner: &Username,
        updates: &[QuantityUpdate],
    ) -> Result<(), CartStoreError>;

    /// Delete a line. Missing lines are a no-op.
    async fn remove(&self, owner: &Username, product_id: &ProductId)
    -> Result<(), CartStoreError>;

    /// All lines for `owner`, in no particular order.
    async fn list_lines(&self, owner: &Username) -> Result<Vec<CartLine>, CartStoreError>;

    /// Remove exactly the given lines, typically the ones a checkout ordered.
    ///
    /// Each line's captured quantity is subtracted from the stored one and the
    /// line is deleted once nothing is left, so units and products added
    /// after `lines` was captured survive.
    async fn clear(&self, owner: &Username, lines: &[CartLine]) -> Result<(), CartStoreError>;
}

/// What a validated [`QuantityUpdate`] does to an existing line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineChange {
    Set(ProductId, Quantity),
    Remove(ProductId),
}

/// Validate a batch of updates before any of them is applied.
fn plan_updates(updates: &[QuantityUpdate]) -> Result<Vec<LineChange>, CartStoreError> {
    updates
        .iter()
        .map(|update| {
            if update.quantity <= 0 {
                return Ok(LineChange::Remove(update.product_id.clone()));
            }
            Quantity::new(update.quantity)
                .map(|q| LineChange::Set(update.product_id.clone(), q))
                .map_err(|_| CartStoreError::QuantityOverflow(update.product_id.clone()))
        })
        .collect()
}
