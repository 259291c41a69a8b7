//! Proof-of-payment upload.

use axum::{
    Json,
    extract::{Multipart, State, multipart::Field},
};
use serde::Serialize;
use tracing::instrument;

use retail_core::OrderId;

use crate::backend::{BackendError, FileUpload};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Largest accepted upload body (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Upload response body.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Default)]
struct ProofForm {
    file: Option<FileUpload>,
    order_id: Option<OrderId>,
}

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("invalid multipart body: {e}"))
}

async fn read_file(field: Field<'_>) -> Result<FileUpload> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(bad_multipart)?;

    Ok(FileUpload {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    })
}

async fn read_form(mut multipart: Multipart) -> Result<ProofForm> {
    let mut form = ProofForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("file") => form.file = Some(read_file(field).await?),
            Some("orderId") => {
                let text = field.text().await.map_err(bad_multipart)?;
                let text = text.trim();
                if !text.is_empty() {
                    form.order_id = Some(OrderId::new(text));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Upload a proof of payment, optionally linked to one of the user's orders.
///
/// Parts: `file` (required) and `orderId` (optional).
#[instrument(skip(state, user, multipart), fields(username = %user.username))]
pub async fn upload_proof(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let form = read_form(multipart).await?;
    let file = form
        .file
        .filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("file is required".to_string()))?;

    if let Some(order_id) = &form.order_id {
        let order = match state.backend().get_order(order_id).await {
            Ok(order) => order,
            Err(BackendError::NotFound(_)) => {
                return Err(AppError::NotFound(format!("order {order_id}")));
            }
            Err(e) => return Err(e.into()),
        };
        if order.username != user.username.as_str() {
            return Err(AppError::Forbidden(format!("order {order_id}")));
        }
    }

    let url = state
        .backend()
        .upload_proof(file, form.order_id.as_ref(), Some(user.username.as_str()))
        .await?;

    add_breadcrumb("upload", "Uploaded proof of payment", None);
    tracing::info!(url = %url, "Proof uploaded");

    Ok(Json(UploadResponse { url }))
}
