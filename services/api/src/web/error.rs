//! services/api/src/web/error.rs
//!
//! Maps core and storage failures onto the outward HTTP error shape. Every
//! error body is `{"kind": ..., "error": ...}` where `kind` is one of a small
//! stable set of machine-readable strings the client switches on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hospital_core::auth::AuthError;
use hospital_core::domain::ValidationError;
use hospital_core::ports::PortError;
use tracing::error;

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

/// A convenience alias for handler return types.
pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "kind": self.kind,
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<PortError> for HttpError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(m) => Self::new(StatusCode::NOT_FOUND, "not_found", m),
            PortError::Conflict(m) => Self::new(StatusCode::CONFLICT, "conflict", m),
            PortError::AlreadyResolved => Self::new(
                StatusCode::CONFLICT,
                "already_resolved",
                "transfer request already resolved",
            ),
            PortError::Unexpected(m) => {
                // Storage detail stays in the logs.
                error!("storage error: {m}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "upstream_failure",
                    "an internal error occurred",
                )
            }
        }
    }
}

impl From<AuthError> for HttpError {
    fn from(e: AuthError) -> Self {
        let message = e.to_string();
        match e {
            AuthError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_credentials", message)
            }
            AuthError::AccountDisabled => {
                Self::new(StatusCode::FORBIDDEN, "account_disabled", message)
            }
            AuthError::RoleNotGranted => {
                Self::new(StatusCode::FORBIDDEN, "role_not_granted", message)
            }
            AuthError::Unauthenticated => {
                Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
            }
            AuthError::Forbidden => Self::new(StatusCode::FORBIDDEN, "forbidden", message),
            AuthError::WrongCurrentPassword => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_credentials", message)
            }
            AuthError::WeakPassword => {
                Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
            }
        }
    }
}

impl From<ValidationError> for HttpError {
    fn from(e: ValidationError) -> Self {
        Self::validation(e.0)
    }
}
