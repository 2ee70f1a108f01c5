//! services/api/src/web/middleware.rs
//!
//! Session middleware for protected routes. Resolves the `session` cookie to
//! an [`AuthContext`] once per request and inserts it into the request
//! extensions. Expired or orphaned sessions fail closed and are deleted on
//! presentation.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;

use crate::web::error::HttpError;
use crate::web::state::AppState;
use hospital_core::auth::{AuthContext, AuthError};
use hospital_core::ports::PortError;

/// Extracts the opaque session token from the `Cookie` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
}

/// Middleware that validates the session cookie and threads an `AuthContext`
/// into the handler.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let token =
        session_token(req.headers()).ok_or_else(|| HttpError::from(AuthError::Unauthenticated))?;

    let session = state
        .db
        .get_auth_session(&token)
        .await?
        .ok_or_else(|| HttpError::from(AuthError::Unauthenticated))?;

    if session.is_expired(Utc::now()) {
        state.db.delete_auth_session(&token).await?;
        return Err(AuthError::Unauthenticated.into());
    }

    // A session whose user was deleted or deactivated is dead weight.
    let user = match state.db.get_user(session.user_id).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => {
            state.db.delete_auth_session(&token).await?;
            return Err(AuthError::Unauthenticated.into());
        }
        Err(e) => return Err(e.into()),
    };
    if !user.is_active {
        state.db.delete_auth_session(&token).await?;
        return Err(AuthError::Unauthenticated.into());
    }

    let ctx = AuthContext {
        user_id: user.id,
        role: session.role,
        hospital_id: user.hospital_id,
    };
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}
