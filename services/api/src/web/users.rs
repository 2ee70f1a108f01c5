//! services/api/src/web/users.rs
//!
//! Staff account management. Hospital admins operate within their own
//! hospital; system admins are unscoped. Deletion is reserved to system
//! admins, everything else is a scoped edit.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::password::hash_password;
use crate::web::error::{HttpError, HttpResult};
use crate::web::state::AppState;
use hospital_core::auth::{
    check_password_strength, check_role_assignment, AuthContext, AuthError, HOSPITAL_ADMIN,
    SYSTEM_ADMIN,
};
use hospital_core::domain::PublicUser;
use hospital_core::ports::{NewUser, UserUpdate};

const MANAGER_ROLES: &[&str] = &[SYSTEM_ADMIN, HOSPITAL_ADMIN];

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub roles: Vec<String>,
    /// Defaults to the first granted role.
    pub active_role: Option<String>,
    pub hospital_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub active_role: String,
    pub hospital_id: Option<Uuid>,
    pub is_active: bool,
}

/// Scoped callers may only touch accounts affiliated with their own hospital.
fn ensure_account_in_scope(ctx: &AuthContext, hospital_id: Option<Uuid>) -> Result<(), AuthError> {
    match (ctx.hospital_scope(), hospital_id) {
        (None, _) => Ok(()),
        (Some(own), Some(target)) if own == target => Ok(()),
        _ => Err(AuthError::Forbidden),
    }
}

/// GET /api/users - List accounts within the caller's scope.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<PublicUser>>> {
    ctx.require_role(MANAGER_ROLES)?;
    let users = state.db.list_users(ctx.hospital_scope()).await?;
    Ok(Json(users.iter().map(|u| u.to_public()).collect()))
}

/// POST /api/users - Create an account.
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(MANAGER_ROLES)?;

    // Hospital admins create staff for their own hospital only.
    let hospital_id = match ctx.hospital_scope() {
        Some(own) => {
            if req.hospital_id.is_some_and(|h| h != own) {
                return Err(AuthError::Forbidden.into());
            }
            Some(own)
        }
        None => req.hospital_id,
    };

    let active_role = match req.active_role {
        Some(role) => role,
        None => req
            .roles
            .first()
            .cloned()
            .ok_or_else(|| HttpError::validation("at least one role is required"))?,
    };
    check_role_assignment(&req.roles, &active_role, hospital_id)?;
    check_password_strength(&req.password)?;

    let password_hash = hash_password(&req.password).map_err(|_| {
        HttpError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upstream_failure",
            "failed to hash password",
        )
    })?;
    let user = state
        .db
        .create_user(NewUser {
            name: req.name,
            email: req.email,
            password_hash,
            roles: req.roles,
            active_role,
            hospital_id,
        })
        .await?;

    info!(user = %user.id, "account created");
    Ok((StatusCode::CREATED, Json(user.to_public())))
}

/// PUT /api/users/{id} - Full-record edit (password excluded).
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> HttpResult<Json<PublicUser>> {
    ctx.require_role(MANAGER_ROLES)?;
    let existing = state.db.get_user(id).await?;
    ensure_account_in_scope(&ctx, existing.hospital_id)?;
    ensure_account_in_scope(&ctx, req.hospital_id)?;
    check_role_assignment(&req.roles, &req.active_role, req.hospital_id)?;

    let user = state
        .db
        .update_user(
            id,
            UserUpdate {
                name: req.name,
                email: req.email,
                roles: req.roles,
                active_role: req.active_role,
                hospital_id: req.hospital_id,
                is_active: req.is_active,
            },
        )
        .await?;
    Ok(Json(user.to_public()))
}

/// DELETE /api/users/{id} - Hard delete, system administrators only.
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<serde_json::Value>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    state.db.delete_sessions_for_user(id).await?;
    state.db.delete_user(id).await?;
    Ok(Json(serde_json::json!({ "message": "user deleted" })))
}

/// PATCH /api/users/{id}/toggle-active - Flip the soft-deactivation flag.
/// Deactivation also revokes the account's sessions.
pub async fn toggle_active_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<PublicUser>> {
    ctx.require_role(MANAGER_ROLES)?;
    let existing = state.db.get_user(id).await?;
    ensure_account_in_scope(&ctx, existing.hospital_id)?;

    let user = state.db.toggle_user_active(id).await?;
    if !user.is_active {
        state.db.delete_sessions_for_user(id).await?;
    }
    Ok(Json(user.to_public()))
}
