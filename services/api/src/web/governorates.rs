//! services/api/src/web/governorates.rs
//!
//! Governorate reference data.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::web::error::HttpResult;
use crate::web::state::AppState;
use hospital_core::auth::{AuthContext, SYSTEM_ADMIN};
use hospital_core::domain::Governorate;

#[derive(Deserialize)]
pub struct CreateGovernorateRequest {
    pub name: String,
    pub code: String,
}

#[derive(Deserialize, Default)]
pub struct UpdateGovernorateRequest {
    pub name: Option<String>,
    pub code: Option<String>,
}

/// GET /api/governorates - List, available to any authenticated caller.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(_ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<Governorate>>> {
    Ok(Json(state.db.list_governorates().await?))
}

/// POST /api/governorates
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateGovernorateRequest>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let governorate = state.db.create_governorate(&req.name, &req.code).await?;
    Ok((StatusCode::CREATED, Json(governorate)))
}

/// PUT /api/governorates/{id}
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGovernorateRequest>,
) -> HttpResult<Json<Governorate>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let governorate = state
        .db
        .update_governorate(id, req.name.as_deref(), req.code.as_deref())
        .await?;
    Ok(Json(governorate))
}

/// DELETE /api/governorates/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<serde_json::Value>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    state.db.delete_governorate(id).await?;
    Ok(Json(serde_json::json!({ "message": "governorate deleted" })))
}
