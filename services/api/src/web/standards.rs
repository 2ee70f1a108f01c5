//! services/api/src/web/standards.rs
//!
//! Medical quality standards, mirroring the service-catalog surface.

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
use hospital_core::domain::MedicalStandard;
use hospital_core::ports::{NewStandard, StandardUpdate};

#[derive(Deserialize)]
pub struct CreateStandardRequest {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub criteria: String,
}

#[derive(Deserialize, Default)]
pub struct UpdateStandardRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub criteria: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /api/standards
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(_ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<MedicalStandard>>> {
    Ok(Json(state.db.list_standards().await?))
}

/// POST /api/standards
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateStandardRequest>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let standard = state
        .db
        .create_standard(NewStandard {
            name: req.name,
            category: req.category,
            description: req.description,
            criteria: req.criteria,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(standard)))
}

/// PUT /api/standards/{id}
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStandardRequest>,
) -> HttpResult<Json<MedicalStandard>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let standard = state
        .db
        .update_standard(
            id,
            StandardUpdate {
                name: req.name,
                category: req.category,
                description: req.description,
                criteria: req.criteria,
                is_active: req.is_active,
            },
        )
        .await?;
    Ok(Json(standard))
}

/// DELETE /api/standards/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<serde_json::Value>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    state.db.delete_standard(id).await?;
    Ok(Json(serde_json::json!({ "message": "standard deleted" })))
}

/// PATCH /api/standards/{id}/toggle-status
pub async fn toggle_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<MedicalStandard>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    Ok(Json(state.db.toggle_standard_active(id).await?))
}
