//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: login, logout, session check and the two
//! password operations. Login is role-aware: the client names which of its
//! granted roles the session should carry.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::password::{hash_password, verify_password};
use crate::web::error::{HttpError, HttpResult};
use crate::web::middleware::session_token;
use crate::web::state::AppState;
use hospital_core::auth::{
    check_login, check_password_strength, AuthContext, AuthError, SYSTEM_ADMIN,
};
use hospital_core::domain::User;
use hospital_core::ports::PortError;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Which granted role this session should act as.
    pub role: String,
}

/// The client-facing identity; the password hash never appears here.
#[derive(Serialize, ToSchema)]
pub struct IdentityResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub active_role: String,
    pub hospital_id: Option<Uuid>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for IdentityResponse {
    fn from(user: &User) -> Self {
        let public = user.to_public();
        Self {
            id: public.id,
            name: public.name,
            email: public.email,
            roles: public.roles,
            active_role: public.active_role,
            hospital_id: public.hospital_id,
            last_login: public.last_login,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub user_id: Uuid,
    pub new_password: String,
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

fn session_cookie(config: &Config, token: &str, max_age_seconds: i64) -> String {
    let mut cookie =
        format!("session={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_seconds}");
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_cookie(config: &Config) -> String {
    session_cookie(config, "", 0)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/login - Create a role-bound session.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; session cookie set", body = IdentityResponse),
        (status = 401, description = "Unknown email or wrong password"),
        (status = 403, description = "Account disabled or role not granted")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> HttpResult<impl IntoResponse> {
    let user = state.db.get_user_by_email(&req.email).await?;
    let password_ok = user
        .as_ref()
        .map(|u| verify_password(&req.password, &u.password_hash))
        .unwrap_or(false);
    check_login(user.as_ref(), password_ok, &req.role)?;
    let user = user.ok_or_else(|| HttpError::from(AuthError::InvalidCredentials))?;

    let token = Uuid::new_v4().to_string();
    let ttl = Duration::hours(state.config.session_ttl_hours);
    let expires_at = Utc::now() + ttl;
    state
        .db
        .create_auth_session(&token, user.id, &req.role, expires_at)
        .await?;
    let user = state.db.record_login(user.id, &req.role, Utc::now()).await?;

    info!(user_id = %user.id, role = %req.role, "login");
    let cookie = session_cookie(&state.config, &token, ttl.num_seconds());
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(IdentityResponse::from(&user)),
    ))
}

/// POST /api/auth/logout - Destroy the presented session. Idempotent: a
/// missing or already-deleted session still clears the cookie with 200.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session destroyed; cookie cleared")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HttpResult<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        state.db.delete_auth_session(&token).await?;
    }
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_cookie(&state.config))],
        Json(serde_json::json!({ "message": "logged out" })),
    ))
}

/// GET /api/auth/check - Return the identity behind the current session.
#[utoipa::path(
    get,
    path = "/api/auth/check",
    responses(
        (status = 200, description = "Session is valid", body = IdentityResponse),
        (status = 401, description = "No valid session")
    )
)]
pub async fn check_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> HttpResult<Json<IdentityResponse>> {
    // The account may be deleted between the middleware lookup and this one;
    // that is a dead session, not a missing resource.
    let user = match state.db.get_user(ctx.user_id).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => return Err(AuthError::Unauthenticated.into()),
        Err(e) => return Err(e.into()),
    };
    Ok(Json(IdentityResponse::from(&user)))
}

/// POST /api/auth/change-password - Self-service password change. Existing
/// sessions stay valid.
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> HttpResult<Json<serde_json::Value>> {
    let user = state.db.get_user(ctx.user_id).await?;
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(AuthError::WrongCurrentPassword.into());
    }
    check_password_strength(&req.new_password)?;

    let hash = hash_password(&req.new_password).map_err(|e| {
        error!("failed to hash password: {e}");
        HttpError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upstream_failure",
            "failed to update password",
        )
    })?;
    state.db.update_password(user.id, &hash).await?;
    Ok(Json(serde_json::json!({ "message": "password updated" })))
}

/// POST /api/auth/reset-password - Administrative reset. Revokes every
/// session of the target account.
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<ResetPasswordRequest>,
) -> HttpResult<Json<serde_json::Value>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    check_password_strength(&req.new_password)?;

    // 404 before touching anything if the target does not exist.
    let target = state.db.get_user(req.user_id).await?;
    let hash = hash_password(&req.new_password).map_err(|e| {
        error!("failed to hash password: {e}");
        HttpError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upstream_failure",
            "failed to reset password",
        )
    })?;
    state.db.update_password(target.id, &hash).await?;
    let revoked = state.db.delete_sessions_for_user(target.id).await?;

    info!(target = %target.id, revoked, "password reset by administrator");
    Ok(Json(serde_json::json!({
        "message": "password reset",
        "revoked_sessions": revoked,
    })))
}
