//! Cart route handlers.
//!
//! All handlers act on the logged-in user's own cart and answer with JSON.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use retail_core::ProductId;

use crate::cart::{CartLine, QuantityUpdate};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::services::{CartView, CheckoutResult, CheckoutStatus};
use crate::state::AppState;

/// Add to cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

/// Bulk quantity update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub items: Vec<QuantityUpdate>,
}

/// Remove from cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
}

/// Checkout response: the result plus its overall status.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub status: CheckoutStatus,
    #[serde(flatten)]
    pub result: CheckoutResult,
}

fn require_product_id(product_id: &ProductId) -> Result<()> {
    if product_id.is_blank() {
        return Err(AppError::BadRequest("productId is required".to_string()));
    }
    Ok(())
}

/// Show the cart with current product data.
#[instrument(skip(state, user), fields(username = %user.username))]
pub async fn show(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Result<Json<CartView>> {
    Ok(Json(state.cart().view(&user.username).await?))
}

/// Add one unit of a product.
#[instrument(skip(state, user, body), fields(username = %user.username, product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddToCartRequest>,
) -> Result<Json<CartLine>> {
    require_product_id(&body.product_id)?;

    let line = state.cart().add(&user.username, &body.product_id).await?;
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", body.product_id.as_str())]),
    );

    Ok(Json(line))
}

/// Overwrite quantities; zero or below removes a line.
#[instrument(skip(state, user, body), fields(username = %user.username, items = body.items.len()))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    state.cart().update(&user.username, &body.items).await?;
    Ok(Json(state.cart().view(&user.username).await?))
}

/// Remove a line.
#[instrument(skip(state, user, body), fields(username = %user.username, product_id = %body.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    require_product_id(&body.product_id)?;

    state.cart().remove(&user.username, &body.product_id).await?;
    Ok(Json(state.cart().view(&user.username).await?))
}

/// Check out the whole cart.
///
/// Answers `200` with per-line results whenever submission started, even if
/// every line failed.
#[instrument(skip(state, user), fields(username = %user.username))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CheckoutResponse>> {
    add_breadcrumb("checkout", "Checkout started", None);

    let result = state.checkout().checkout(&user.username).await?;
    Ok(Json(CheckoutResponse {
        status: result.status(),
        result,
    }))
}
