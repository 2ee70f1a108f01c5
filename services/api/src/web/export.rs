//! services/api/src/web/export.rs
//!
//! CSV downloads for hospitals, patients and transfers. The only supported
//! format is CSV; spreadsheet and PDF rendering stay client-side.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::web::error::{HttpError, HttpResult};
use crate::web::state::AppState;
use hospital_core::auth::{AuthContext, DATA_OFFICER, SYSTEM_ADMIN};
use hospital_core::domain::Hospital;
use hospital_core::ports::HospitalFilter;

#[derive(Deserialize, Default)]
pub struct ExportQuery {
    pub format: Option<String>,
}

fn check_format(query: &ExportQuery) -> Result<(), HttpError> {
    match query.format.as_deref() {
        None | Some("csv") => Ok(()),
        Some(other) => Err(HttpError::validation(format!(
            "unsupported export format '{other}'; only csv is available"
        ))),
    }
}

/// Quotes a field when it contains a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_document(header: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut out = header.join(",");
    out.push('\n');
    for row in rows {
        let line: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn csv_response(filename: &str, body: String) -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
}

async fn all_hospitals(state: &AppState) -> HttpResult<Vec<Hospital>> {
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let chunk = state
            .db
            .list_hospitals(HospitalFilter {
                page,
                limit: 1000,
                ..Default::default()
            })
            .await?;
        let total_pages = chunk.total_pages;
        all.extend(chunk.data);
        if page >= total_pages {
            break;
        }
        page += 1;
    }
    Ok(all)
}

/// GET /api/export/hospitals
pub async fn hospitals_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ExportQuery>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    check_format(&query)?;

    let rows = all_hospitals(&state)
        .await?
        .into_iter()
        .map(|h| {
            vec![
                h.code,
                h.name,
                h.governorate_name.unwrap_or_default(),
                h.icu_beds.to_string(),
                h.pediatric_beds.to_string(),
                h.incubators.to_string(),
                h.newborn_beds.to_string(),
                h.medium_care_beds.to_string(),
            ]
        })
        .collect();
    let body = csv_document(
        &[
            "code",
            "name",
            "governorate",
            "icu_beds",
            "pediatric_beds",
            "incubators",
            "newborn_beds",
            "medium_care_beds",
        ],
        rows,
    );
    Ok(csv_response("hospitals.csv", body))
}

/// GET /api/export/patients
pub async fn patients_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ExportQuery>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(&[SYSTEM_ADMIN, DATA_OFFICER])?;
    check_format(&query)?;

    let rows = state
        .db
        .list_patients(ctx.hospital_scope())
        .await?
        .into_iter()
        .map(|p| {
            vec![
                p.report_number.unwrap_or_default(),
                p.full_name,
                p.national_id,
                p.gender.map(|g| g.as_str().to_string()).unwrap_or_default(),
                p.governorate.unwrap_or_default(),
                p.phone.unwrap_or_default(),
                p.referral_source.unwrap_or_default(),
                p.admission_date.map(|d| d.to_string()).unwrap_or_default(),
                p.initial_diagnosis.unwrap_or_default(),
                p.status.as_str().to_string(),
                p.discharge_status.unwrap_or_default(),
                p.discharge_date.map(|d| d.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    let body = csv_document(
        &[
            "report_number",
            "full_name",
            "national_id",
            "gender",
            "governorate",
            "phone",
            "referral_source",
            "admission_date",
            "initial_diagnosis",
            "status",
            "discharge_status",
            "discharge_date",
        ],
        rows,
    );
    Ok(csv_response("patients.csv", body))
}

/// GET /api/export/transfers
pub async fn transfers_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ExportQuery>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(&[SYSTEM_ADMIN, DATA_OFFICER])?;
    check_format(&query)?;

    let rows = state
        .db
        .list_transfers()
        .await?
        .into_iter()
        .map(|t| {
            vec![
                t.patient_name,
                t.national_id,
                t.from_hospital,
                t.to_hospital,
                t.reason,
                t.status.as_str().to_string(),
                t.requested_by.unwrap_or_default(),
                t.approved_by.unwrap_or_default(),
                t.created_at.to_rfc3339(),
            ]
        })
        .collect();
    let body = csv_document(
        &[
            "patient_name",
            "national_id",
            "from_hospital",
            "to_hospital",
            "reason",
            "status",
            "requested_by",
            "approved_by",
            "created_at",
        ],
        rows,
    );
    Ok(csv_response("transfers.csv", body))
}
