//! crates/hospital_core/src/auth.rs
//!
//! Pure authentication and authorization policy. Every accept/deny decision
//! the gates make lives here so it can be unit tested without a live session
//! store or database. The web layer resolves an [`AuthContext`] once per
//! request and threads it into handlers explicitly.

use crate::domain::{User, ValidationError};
use uuid::Uuid;

/// Role names are system keys; these are the built-in ones the route gates
/// reference directly.
pub const SYSTEM_ADMIN: &str = "system_admin";
pub const HOSPITAL_ADMIN: &str = "hospital_admin";
pub const DATA_OFFICER: &str = "data_officer";
pub const DOCTOR: &str = "doctor";
pub const NURSE: &str = "nurse";

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Failures raised by the authentication and authorization gates. Each maps
/// to a distinct, stable outward signal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account is disabled")]
    AccountDisabled,
    #[error("role is not granted to this account")]
    RoleNotGranted,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("not allowed to access this resource")]
    Forbidden,
    #[error("current password is incorrect")]
    WrongCurrentPassword,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
}

/// The request-scoped identity resolved by the session middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: String,
    pub hospital_id: Option<Uuid>,
}

impl AuthContext {
    /// The per-route role gate: permit iff the session role is a member of
    /// the route's declared allowed set.
    pub fn require_role(&self, allowed: &[&str]) -> Result<(), AuthError> {
        if allowed.iter().any(|r| *r == self.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// The hospital scope this session is confined to. `system_admin` and
    /// `data_officer` are system-wide; every other role only sees its own
    /// hospital's records.
    pub fn hospital_scope(&self) -> Option<Uuid> {
        match self.role.as_str() {
            SYSTEM_ADMIN | DATA_OFFICER => None,
            _ => self.hospital_id,
        }
    }

    /// Permit a mutation on a record owned by `target_hospital` iff the
    /// session is unscoped or affiliated with that hospital.
    pub fn ensure_hospital_access(&self, target_hospital: Uuid) -> Result<(), AuthError> {
        match self.hospital_scope() {
            None => Ok(()),
            Some(own) if own == target_hospital => Ok(()),
            Some(_) => Err(AuthError::Forbidden),
        }
    }
}

/// Decides a login attempt against the loaded user record.
///
/// `user` is `None` when no account matched the email; `password_ok` is the
/// outcome of the hash verification (only evaluated when a record exists).
/// Check order matches the established behavior: missing account, disabled
/// account, bad password, ungranted role.
pub fn check_login(
    user: Option<&User>,
    password_ok: bool,
    requested_role: &str,
) -> Result<(), AuthError> {
    let user = user.ok_or(AuthError::InvalidCredentials)?;
    if !user.is_active {
        return Err(AuthError::AccountDisabled);
    }
    if !password_ok {
        return Err(AuthError::InvalidCredentials);
    }
    if !user.roles.iter().any(|r| r == requested_role) {
        return Err(AuthError::RoleNotGranted);
    }
    Ok(())
}

/// Rejects passwords below the minimum length.
pub fn check_password_strength(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        Err(AuthError::WeakPassword)
    } else {
        Ok(())
    }
}

/// Whether a role only makes sense with a hospital affiliation.
pub fn requires_affiliation(role: &str) -> bool {
    !matches!(role, SYSTEM_ADMIN | DATA_OFFICER)
}

/// Enforces the affiliation invariant on a user's role set: hospital-bound
/// roles require a hospital, and the active role must be granted.
pub fn check_role_assignment(
    roles: &[String],
    active_role: &str,
    hospital_id: Option<Uuid>,
) -> Result<(), ValidationError> {
    if roles.is_empty() {
        return Err(ValidationError("at least one role is required".to_string()));
    }
    if !roles.iter().any(|r| r == active_role) {
        return Err(ValidationError(
            "active role must be one of the granted roles".to_string(),
        ));
    }
    if hospital_id.is_none() {
        if let Some(role) = roles.iter().find(|r| requires_affiliation(r)) {
            return Err(ValidationError(format!(
                "role '{role}' requires a hospital affiliation"
            )));
        }
    }
    Ok(())
}
