//! services/api/src/web/protocols.rs
//!
//! The treatment-protocol catalog: readable by any authenticated caller,
//! writable by system administrators, with an activation toggle.

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
use hospital_core::domain::Protocol;
use hospital_core::ports::{NewProtocol, ProtocolUpdate};

#[derive(Deserialize)]
pub struct CreateProtocolRequest {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateProtocolRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /api/protocols
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(_ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<Protocol>>> {
    Ok(Json(state.db.list_protocols().await?))
}

/// POST /api/protocols
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateProtocolRequest>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let protocol = state
        .db
        .create_protocol(NewProtocol {
            name: req.name,
            code: req.code,
            description: req.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(protocol)))
}

/// PUT /api/protocols/{id}
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProtocolRequest>,
) -> HttpResult<Json<Protocol>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let protocol = state
        .db
        .update_protocol(
            id,
            ProtocolUpdate {
                name: req.name,
                code: req.code,
                description: req.description,
                is_active: req.is_active,
            },
        )
        .await?;
    Ok(Json(protocol))
}

/// DELETE /api/protocols/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<serde_json::Value>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    state.db.delete_protocol(id).await?;
    Ok(Json(serde_json::json!({ "message": "protocol deleted" })))
}

/// PATCH /api/protocols/{id}/toggle-status
pub async fn toggle_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Protocol>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    Ok(Json(state.db.toggle_protocol_active(id).await?))
}
