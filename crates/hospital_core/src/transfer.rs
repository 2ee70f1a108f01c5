//! crates/hospital_core/src/transfer.rs
//!
//! The transfer-request lifecycle: `pending` resolves exactly once to
//! `approved` or `rejected`. The decision logic is pure; the storage adapter
//! is responsible for making the transition an atomic conditional update.

use crate::auth::{AuthContext, AuthError, HOSPITAL_ADMIN};
use crate::domain::{PatientStatus, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransferStatus::Pending),
            "approved" => Some(TransferStatus::Approved),
            "rejected" => Some(TransferStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

/// The two ways a pending request can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Approve,
    Reject,
}

impl TransferOutcome {
    pub fn terminal_status(&self) -> TransferStatus {
        match self {
            TransferOutcome::Approve => TransferStatus::Approved,
            TransferOutcome::Reject => TransferStatus::Rejected,
        }
    }

    /// The patient-side effect committed together with the request update.
    pub fn patient_status(&self) -> PatientStatus {
        match self {
            TransferOutcome::Approve => PatientStatus::Transferred,
            TransferOutcome::Reject => PatientStatus::TransferRejected,
        }
    }
}

/// An inter-hospital transfer request for one patient.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub from_hospital: String,
    pub to_hospital: String,
    pub reason: String,
    pub status: TransferStatus,
    pub notes: Option<String>,
    pub requested_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Only a hospital admin of the patient's current hospital may resolve a
/// request. Unaffiliated hospital admins fail closed.
pub fn check_resolution_rights(
    ctx: &AuthContext,
    patient_hospital_id: Uuid,
) -> Result<(), AuthError> {
    ctx.require_role(&[HOSPITAL_ADMIN])?;
    match ctx.hospital_id {
        Some(own) if own == patient_hospital_id => Ok(()),
        _ => Err(AuthError::Forbidden),
    }
}

/// Validates the resolution payload and returns the notes to persist.
/// Rejections require an explicit reason; approvals get a fixed note.
pub fn resolution_notes(
    outcome: TransferOutcome,
    notes: Option<&str>,
) -> Result<String, ValidationError> {
    match outcome {
        TransferOutcome::Approve => Ok(notes
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("transfer request approved")
            .to_string()),
        TransferOutcome::Reject => {
            let trimmed = notes.map(str::trim).unwrap_or("");
            if trimmed.is_empty() {
                Err(ValidationError(
                    "a rejection reason is required".to_string(),
                ))
            } else {
                Ok(trimmed.to_string())
            }
        }
    }
}
