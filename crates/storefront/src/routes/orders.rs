//! Order history route handlers.
//!
//! Orders are read from the backend on every request. A user only ever sees
//! orders placed under their own username.

use std::cmp::Reverse;

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use retail_core::{OrderId, Username};

use crate::backend::{BackendError, Order};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Keep the owner's orders, newest first.
fn owned_by(orders: Vec<Order>, owner: &Username) -> Vec<Order> {
    let mut own: Vec<Order> = orders
        .into_iter()
        .filter(|o| o.username == owner.as_str())
        .collect();
    own.sort_by_key(|o| Reverse(o.placed_at()));
    own
}

/// List the user's orders.
#[instrument(skip(state, user), fields(username = %user.username))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = state.backend().list_orders().await?;
    Ok(Json(owned_by(orders, &user.username)))
}

/// Show one of the user's orders.
#[instrument(skip(state, user), fields(username = %user.username, order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let id = OrderId::new(id);
    let order = match state.backend().get_order(&id).await {
        Ok(order) => order,
        Err(BackendError::NotFound(_)) => return Err(AppError::NotFound(format!("order {id}"))),
        Err(e) => return Err(e.into()),
    };

    if order.username != user.username.as_str() {
        return Err(AppError::Forbidden(format!("order {id}")));
    }

    Ok(Json(order))
}
