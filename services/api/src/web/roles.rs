//! services/api/src/web/roles.rs
//!
//! Role catalog management. The permission payload is a closed typed schema;
//! anything outside it fails deserialization before reaching the store.

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
use hospital_core::domain::{PermissionSet, Role};
use hospital_core::ports::NewRole;

#[derive(Deserialize)]
pub struct RoleRequest {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// GET /api/roles - List, available to any authenticated caller.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(_ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<Role>>> {
    Ok(Json(state.db.list_roles().await?))
}

/// POST /api/roles
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<RoleRequest>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let role = state
        .db
        .create_role(NewRole {
            name: req.name,
            display_name: req.display_name,
            description: req.description,
            permissions: req.permissions,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// PUT /api/roles/{id}
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<RoleRequest>,
) -> HttpResult<Json<Role>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let role = state
        .db
        .update_role(
            id,
            NewRole {
                name: req.name,
                display_name: req.display_name,
                description: req.description,
                permissions: req.permissions,
            },
        )
        .await?;
    Ok(Json(role))
}

/// DELETE /api/roles/{id} - Blocked with 409 while any account still holds
/// the role.
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<serde_json::Value>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    state.db.delete_role(id).await?;
    Ok(Json(serde_json::json!({ "message": "role deleted" })))
}
