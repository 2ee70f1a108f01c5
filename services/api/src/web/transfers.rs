//! services/api/src/web/transfers.rs
//!
//! The transfer-request approval surface. Resolution order of checks is
//! deliberate: existence first (404), then rights (403), then the atomic
//! state transition (409 when a concurrent resolver won).

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::error::HttpResult;
use crate::web::state::AppState;
use hospital_core::auth::{AuthContext, DATA_OFFICER, SYSTEM_ADMIN};
use hospital_core::ports::PendingTransfer;
use hospital_core::transfer::{
    check_resolution_rights, resolution_notes, TransferOutcome, TransferRequest,
};

#[derive(Deserialize, Default, ToSchema)]
pub struct ResolveRequest {
    /// Free-text notes; required when rejecting.
    pub notes: Option<String>,
}

/// GET /api/transfers/pending - Pending requests joined with patient and
/// requester identity, newest first.
#[utoipa::path(
    get,
    path = "/api/transfers/pending",
    responses(
        (status = 200, description = "Pending transfer requests"),
        (status = 403, description = "Caller is not system_admin or data_officer")
    )
)]
pub async fn list_pending_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<PendingTransfer>>> {
    ctx.require_role(&[SYSTEM_ADMIN, DATA_OFFICER])?;
    Ok(Json(state.db.list_pending_transfers().await?))
}

async fn resolve(
    state: Arc<AppState>,
    ctx: AuthContext,
    transfer_id: Uuid,
    outcome: TransferOutcome,
    notes: Option<String>,
) -> HttpResult<Json<TransferRequest>> {
    let transfer = state.db.get_transfer(transfer_id).await?;
    check_resolution_rights(&ctx, transfer.patient_hospital_id)?;
    let notes = resolution_notes(outcome, notes.as_deref())?;

    let resolved = state
        .db
        .resolve_transfer(transfer_id, outcome, ctx.user_id, &notes)
        .await?;
    info!(
        transfer = %transfer_id,
        patient = %resolved.patient_id,
        status = resolved.status.as_str(),
        "transfer request resolved"
    );
    Ok(Json(resolved))
}

/// POST /api/transfers/{id}/approve - Resolve a pending request as approved.
#[utoipa::path(
    post,
    path = "/api/transfers/{id}/approve",
    request_body = ResolveRequest,
    params(("id" = Uuid, Path, description = "Transfer request id")),
    responses(
        (status = 200, description = "Request approved; patient marked transferred"),
        (status = 403, description = "Caller may not resolve this request"),
        (status = 404, description = "No such transfer request"),
        (status = 409, description = "Request was already resolved")
    )
)]
pub async fn approve_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveRequest>>,
) -> HttpResult<Json<TransferRequest>> {
    let notes = body.and_then(|Json(b)| b.notes);
    resolve(state, ctx, id, TransferOutcome::Approve, notes).await
}

/// POST /api/transfers/{id}/reject - Resolve a pending request as rejected.
/// A non-empty reason is required.
#[utoipa::path(
    post,
    path = "/api/transfers/{id}/reject",
    request_body = ResolveRequest,
    params(("id" = Uuid, Path, description = "Transfer request id")),
    responses(
        (status = 200, description = "Request rejected; patient marked transfer_rejected"),
        (status = 400, description = "Missing rejection reason"),
        (status = 403, description = "Caller may not resolve this request"),
        (status = 404, description = "No such transfer request"),
        (status = 409, description = "Request was already resolved")
    )
)]
pub async fn reject_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveRequest>>,
) -> HttpResult<Json<TransferRequest>> {
    let notes = body.and_then(|Json(b)| b.notes);
    resolve(state, ctx, id, TransferOutcome::Reject, notes).await
}
