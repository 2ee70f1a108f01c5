//! services/api/src/web/patients.rs
//!
//! Patient registration and management. Clinical roles only see and touch
//! their own hospital's records; registration may carry a transfer block
//! which opens a pending transfer request in the same breath.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::web::error::{HttpError, HttpResult};
use crate::web::state::AppState;
use hospital_core::auth::{AuthContext, DOCTOR, HOSPITAL_ADMIN, NURSE, SYSTEM_ADMIN};
use hospital_core::domain::{NationalId, Patient, PatientStatus};
use hospital_core::ports::{NewPatient, NewTransfer, PatientUpdate};

const CLINICAL_ROLES: &[&str] = &[SYSTEM_ADMIN, HOSPITAL_ADMIN, DOCTOR, NURSE];

#[derive(Deserialize)]
pub struct TransferBlock {
    pub to_hospital: String,
    pub reason: String,
}

#[derive(Deserialize)]
pub struct RegisterPatientRequest {
    pub report_number: Option<String>,
    pub full_name: String,
    pub national_id: String,
    pub governorate: Option<String>,
    pub phone: Option<String>,
    pub referral_source: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub initial_diagnosis: Option<String>,
    #[serde(default)]
    pub direct_transfer: bool,
    /// Required for unscoped callers; scoped callers default to their own
    /// hospital.
    pub hospital_id: Option<Uuid>,
    /// When present, a pending transfer request is opened at registration.
    pub transfer: Option<TransferBlock>,
}

#[derive(Deserialize, Default)]
pub struct UpdatePatientRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub governorate: Option<String>,
    pub referral_source: Option<String>,
    pub initial_diagnosis: Option<String>,
    pub status: Option<PatientStatus>,
    pub discharge_status: Option<String>,
    pub discharge_date: Option<NaiveDate>,
    pub hospital_id: Option<Uuid>,
}

/// GET /api/patients - List, confined to the caller's hospital scope.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<Patient>>> {
    ctx.require_role(CLINICAL_ROLES)?;
    Ok(Json(state.db.list_patients(ctx.hospital_scope()).await?))
}

/// POST /api/patients - Register a patient (and optionally open a transfer).
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<RegisterPatientRequest>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(CLINICAL_ROLES)?;

    let hospital_id = match req.hospital_id {
        Some(given) => {
            ctx.ensure_hospital_access(given)?;
            given
        }
        None => ctx
            .hospital_scope()
            .ok_or_else(|| HttpError::validation("hospital_id is required"))?,
    };

    let national_id = NationalId::parse(&req.national_id)?;

    let patient = state
        .db
        .create_patient(NewPatient {
            report_number: req.report_number,
            full_name: req.full_name,
            national_id: national_id.raw.clone(),
            gender: Some(national_id.gender),
            governorate: req.governorate,
            phone: req.phone,
            referral_source: req.referral_source,
            admission_date: req.admission_date,
            initial_diagnosis: req.initial_diagnosis,
            direct_transfer: req.direct_transfer,
            hospital_id,
        })
        .await?;

    let transfer = match req.transfer {
        Some(block) => {
            let from = state.db.get_hospital(hospital_id).await?;
            let request = state
                .db
                .create_transfer(NewTransfer {
                    patient_id: patient.id,
                    from_hospital: from.name,
                    to_hospital: block.to_hospital,
                    reason: block.reason,
                    requested_by: Some(ctx.user_id),
                })
                .await?;
            info!(patient = %patient.id, transfer = %request.id, "transfer requested at registration");
            Some(request)
        }
        None => None,
    };

    info!(patient = %patient.id, hospital = %hospital_id, "patient registered");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "patient": patient,
            "transfer_request": transfer,
        })),
    ))
}

/// PUT /api/patients/{id} - Update, confined to the caller's hospital scope.
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> HttpResult<Json<Patient>> {
    ctx.require_role(CLINICAL_ROLES)?;
    let existing = state.db.get_patient(id).await?;
    ctx.ensure_hospital_access(existing.hospital_id)?;
    if let Some(target) = req.hospital_id {
        ctx.ensure_hospital_access(target)?;
    }

    let updated = state
        .db
        .update_patient(
            id,
            PatientUpdate {
                full_name: req.full_name,
                phone: req.phone,
                governorate: req.governorate,
                referral_source: req.referral_source,
                initial_diagnosis: req.initial_diagnosis,
                status: req.status,
                discharge_status: req.discharge_status,
                discharge_date: req.discharge_date,
                hospital_id: req.hospital_id,
            },
        )
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/patients/{id} - Hard delete, system administrators only.
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<serde_json::Value>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    state.db.delete_patient(id).await?;
    Ok(Json(serde_json::json!({ "message": "patient deleted" })))
}
