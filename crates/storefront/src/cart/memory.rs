//! In-process cart store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::instrument;

use retail_core::{ProductId, Quantity, Username};

use super::{CartLine, CartStore, CartStoreError, LineChange, QuantityUpdate, plan_updates};

type OwnerCart = Arc<Mutex<BTreeMap<ProductId, Quantity>>>;

/// Cart store held in memory.
///
/// Each owner's cart sits behind its own mutex, so operations on different
/// owners never contend. Contents are lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStore {
    carts: Arc<RwLock<HashMap<Username, OwnerCart>>>,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The owner's cart, if one was ever created.
    fn existing(&self, owner: &Username) -> Result<Option<OwnerCart>, CartStoreError> {
        let carts = self.carts.read().map_err(|_| poisoned())?;
        Ok(carts.get(owner).cloned())
    }

    /// The owner's cart, created on first use.
    fn get_or_create(&self, owner: &Username) -> Result<OwnerCart, CartStoreError> {
        if let Some(cart) = self.existing(owner)? {
            return Ok(cart);
        }
        let mut carts = self.carts.write().map_err(|_| poisoned())?;
        Ok(Arc::clone(carts.entry(owner.clone()).or_default()))
    }

    /// Run `f` with the owner's cart locked. Owners without a cart are a no-op.
    fn with_existing<F>(&self, owner: &Username, f: F) -> Result<(), CartStoreError>
    where
        F: FnOnce(&mut BTreeMap<ProductId, Quantity>),
    {
        let Some(cart) = self.existing(owner)? else {
            return Ok(());
        };
        let mut lines = cart.lock().map_err(|_| poisoned())?;
        f(&mut lines);
        Ok(())
    }
}

fn poisoned() -> CartStoreError {
    CartStoreError::Unavailable("cart lock poisoned".to_string())
}

#[async_trait]
impl CartStore for MemoryCartStore {
    #[instrument(skip(self), fields(owner = %owner, product_id = %product_id))]
    async fn add_or_increment(
        &self,
        owner: &Username,
        product_id: &ProductId,
    ) -> Result<CartLine, CartStoreError> {
        let cart = self.get_or_create(owner)?;
        let mut lines = cart.lock().map_err(|_| poisoned())?;

        let quantity = match lines.get(product_id) {
            Some(current) => current
                .checked_add(Quantity::ONE)
                .ok_or_else(|| CartStoreError::QuantityOverflow(product_id.clone()))?,
            None => Quantity::ONE,
        };
        lines.insert(product_id.clone(), quantity);

        Ok(CartLine {
            owner: owner.clone(),
            product_id: product_id.clone(),
            quantity,
        })
    }

    #[instrument(skip(self, updates), fields(owner = %owner, count = updates.len()))]
    async fn set_quantities(
        &self,
        owner: &Username,
        updates: &[QuantityUpdate],
    ) -> Result<(), CartStoreError> {
        let plan = plan_updates(updates)?;

        self.with_existing(owner, |lines| {
            for change in plan {
                match change {
                    LineChange::Set(product_id, quantity) => {
                        if let Some(current) = lines.get_mut(&product_id) {
                            *current = quantity;
                        }
                    }
                    LineChange::Remove(product_id) => {
                        lines.remove(&product_id);
                    }
                }
            }
        })
    }

    #[instrument(skip(self), fields(owner = %owner, product_id = %product_id))]
    async fn remove(
        &self,
        owner: &Username,
        product_id: &ProductId,
    ) -> Result<(), CartStoreError> {
        self.with_existing(owner, |lines| {
            lines.remove(product_id);
        })
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn list_lines(&self, owner: &Username) -> Result<Vec<CartLine>, CartStoreError> {
        let Some(cart) = self.existing(owner)? else {
            return Ok(Vec::new());
        };
        let lines = cart.lock().map_err(|_| poisoned())?;

        Ok(lines
            .iter()
            .map(|(product_id, quantity)| CartLine {
                owner: owner.clone(),
                product_id: product_id.clone(),
                quantity: *quantity,
            })
            .collect())
    }

    #[instrument(skip(self, lines), fields(owner = %owner, count = lines.len()))]
    async fn clear(&self, owner: &Username, lines: &[CartLine]) -> Result<(), CartStoreError> {
        self.with_existing(owner, |stored| {
            for line in lines.iter().filter(|l| &l.owner == owner) {
                let remaining = stored
                    .get(&line.product_id)
                    .and_then(|current| current.checked_sub(line.quantity));
                match remaining {
                    Some(left) => {
                        stored.insert(line.product_id.clone(), left);
                    }
                    None => {
                        stored.remove(&line.product_id);
                    }
                }
            }
        })
    }
}
