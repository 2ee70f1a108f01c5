//! services/api/src/seed.rs
//!
//! Startup seed: guarantees a system administrator account exists so a fresh
//! deployment can be logged into.

use crate::config::Config;
use crate::error::ApiError;
use crate::password::hash_password;
use hospital_core::auth::SYSTEM_ADMIN;
use hospital_core::ports::{DatabaseService, NewUser};
use tracing::info;

/// Creates the bootstrap administrator when no account holds `system_admin`.
pub async fn ensure_admin_account(db: &dyn DatabaseService, config: &Config) -> Result<(), ApiError> {
    if db.find_user_with_role(SYSTEM_ADMIN).await?.is_some() {
        return Ok(());
    }

    let password_hash = hash_password(&config.seed_admin_password)
        .map_err(|e| ApiError::Internal(format!("failed to hash seed password: {e}")))?;
    let admin = db
        .create_user(NewUser {
            name: "System Administrator".to_string(),
            email: config.seed_admin_email.clone(),
            password_hash,
            roles: vec![SYSTEM_ADMIN.to_string()],
            active_role: SYSTEM_ADMIN.to_string(),
            hospital_id: None,
        })
        .await?;

    info!(user = %admin.id, email = %admin.email, "seeded system administrator account");
    Ok(())
}
