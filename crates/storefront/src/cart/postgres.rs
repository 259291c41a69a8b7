//! `PostgreSQL` cart store.
//!
//! Table: `storefront.cart_line`. Every mutation runs in a transaction that
//! first takes a transaction-scoped advisory lock on the owner, which
//! serialises one owner's mutations across all storefront processes.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use retail_core::{ProductId, Quantity, Username};

use super::{CartLine, CartStore, CartStoreError, LineChange, QuantityUpdate, plan_updates};

/// SQLSTATE `numeric_value_out_of_range`.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Cart store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a new cart store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a transaction holding the owner's advisory lock.
    async fn lock_owner(
        &self,
        owner: &Username,
    ) -> Result<Transaction<'static, Postgres>, CartStoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(owner.as_str())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

fn to_line(owner: &Username, product_id: ProductId, quantity: i32) -> Result<CartLine, CartStoreError> {
    let quantity = Quantity::new(i64::from(quantity)).map_err(|e| {
        CartStoreError::DataCorruption(format!("invalid quantity for {product_id}: {e}"))
    })?;
    Ok(CartLine {
        owner: owner.clone(),
        product_id,
        quantity,
    })
}

#[async_trait]
impl CartStore for PgCartStore {
    #[instrument(skip(self), fields(owner = %owner, product_id = %product_id))]
    async fn add_or_increment(
        &self,
        owner: &Username,
        product_id: &ProductId,
    ) -> Result<CartLine, CartStoreError> {
        let mut tx = self.lock_owner(owner).await?;

        let quantity: i32 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.cart_line (owner, product_id, quantity)
            VALUES ($1, $2, 1)
            ON CONFLICT (owner, product_id)
            DO UPDATE SET quantity = storefront.cart_line.quantity + 1,
                          updated_at = now()
            RETURNING quantity
            ",
        )
        .bind(owner.as_str())
        .bind(product_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE)
            {
                return CartStoreError::QuantityOverflow(product_id.clone());
            }
            CartStoreError::Database(e)
        })?;

        tx.commit().await?;
        to_line(owner, product_id.clone(), quantity)
    }

    #[instrument(skip(self, updates), fields(owner = %owner, count = updates.len()))]
    async fn set_quantities(
        &self,
        owner: &Username,
        updates: &[QuantityUpdate],
    ) -> Result<(), CartStoreError> {
        let plan = plan_updates(updates)?;
        if plan.is_empty() {
            return Ok(());
        }

        let mut tx = self.lock_owner(owner).await?;

        for change in plan {
            match change {
                LineChange::Set(product_id, quantity) => {
                    sqlx::query(
                        r"
                        UPDATE storefront.cart_line
                        SET quantity = $3, updated_at = now()
                        WHERE owner = $1 AND product_id = $2
                        ",
                    )
                    .bind(owner.as_str())
                    .bind(product_id.as_str())
                    .bind(quantity.as_i32())
                    .execute(&mut *tx)
                    .await?;
                }
                LineChange::Remove(product_id) => {
                    sqlx::query(
                        "DELETE FROM storefront.cart_line WHERE owner = $1 AND product_id = $2",
                    )
                    .bind(owner.as_str())
                    .bind(product_id.as_str())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %owner, product_id = %product_id))]
    async fn remove(
        &self,
        owner: &Username,
        product_id: &ProductId,
    ) -> Result<(), CartStoreError> {
        let mut tx = self.lock_owner(owner).await?;

        sqlx::query("DELETE FROM storefront.cart_line WHERE owner = $1 AND product_id = $2")
            .bind(owner.as_str())
            .bind(product_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn list_lines(&self, owner: &Username) -> Result<Vec<CartLine>, CartStoreError> {
        let rows: Vec<(ProductId, i32)> = sqlx::query_as(
            r"
            SELECT product_id, quantity
            FROM storefront.cart_line
            WHERE owner = $1
            ORDER BY created_at, product_id
            ",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(product_id, quantity)| to_line(owner, product_id, quantity))
            .collect()
    }

    #[instrument(skip(self, lines), fields(owner = %owner, count = lines.len()))]
    async fn clear(&self, owner: &Username, lines: &[CartLine]) -> Result<(), CartStoreError> {
        let own: Vec<&CartLine> = lines.iter().filter(|l| &l.owner == owner).collect();
        if own.is_empty() {
            return Ok(());
        }

        let mut tx = self.lock_owner(owner).await?;

        for line in own {
            let reduced = sqlx::query(
                r"
                UPDATE storefront.cart_line
                SET quantity = quantity - $3, updated_at = now()
                WHERE owner = $1 AND product_id = $2 AND quantity > $3
                ",
            )
            .bind(owner.as_str())
            .bind(line.product_id.as_str())
            .bind(line.quantity.as_i32())
            .execute(&mut *tx)
            .await?;

            if reduced.rows_affected() == 0 {
                sqlx::query(
                    "DELETE FROM storefront.cart_line WHERE owner = $1 AND product_id = $2",
                )
                .bind(owner.as_str())
                .bind(line.product_id.as_str())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_line_rejects_stored_zero() {
        let owner = Username::parse("alice").unwrap();
        let err = to_line(&owner, ProductId::new("P1"), 0).unwrap_err();
        assert!(matches!(err, CartStoreError::DataCorruption(_)));

        let line = to_line(&owner, ProductId::new("P1"), 3).unwrap();
        assert_eq!(line.quantity.get(), 3);
    }
}
