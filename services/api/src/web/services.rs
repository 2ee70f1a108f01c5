//! services/api/src/web/services.rs
//!
//! The medical-service catalog: readable by any authenticated caller,
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
use hospital_core::domain::MedicalService;
use hospital_core::ports::{NewService, ServiceUpdate};

#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub code: String,
    pub kind: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /api/services
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(_ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<MedicalService>>> {
    Ok(Json(state.db.list_services().await?))
}

/// POST /api/services
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateServiceRequest>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let service = state
        .db
        .create_service(NewService {
            name: req.name,
            code: req.code,
            kind: req.kind,
            description: req.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// PUT /api/services/{id}
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateServiceRequest>,
) -> HttpResult<Json<MedicalService>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let service = state
        .db
        .update_service(
            id,
            ServiceUpdate {
                name: req.name,
                code: req.code,
                kind: req.kind,
                description: req.description,
                is_active: req.is_active,
            },
        )
        .await?;
    Ok(Json(service))
}

/// DELETE /api/services/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<serde_json::Value>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    state.db.delete_service(id).await?;
    Ok(Json(serde_json::json!({ "message": "service deleted" })))
}

/// PATCH /api/services/{id}/toggle-status
pub async fn toggle_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<MedicalService>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    Ok(Json(state.db.toggle_service_active(id).await?))
}
