//! services/api/src/web/upload.rs
//!
//! Bulk CSV import for governorates, hospitals and patients. Each upload
//! takes a multipart file part, processes rows independently and reports
//! `{imported, skipped, errors}`; a bad row never aborts the batch.

use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::web::error::{HttpError, HttpResult};
use crate::web::state::AppState;
use hospital_core::auth::{AuthContext, SYSTEM_ADMIN};
use hospital_core::domain::NationalId;
use hospital_core::ports::{NewHospital, NewPatient, PortError};

#[derive(Serialize, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    fn skip(&mut self, row: usize, message: impl std::fmt::Display) {
        self.skipped += 1;
        self.errors.push(format!("row {row}: {message}"));
    }
}

//=========================================================================================
// CSV Parsing
//=========================================================================================

/// Splits one CSV line, honoring double-quoted fields and doubled quotes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// A parsed CSV upload: lowercase headers plus data rows.
struct CsvSheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvSheet {
    fn parse(text: &str) -> Result<Self, HttpError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header_line = lines
            .next()
            .ok_or_else(|| HttpError::validation("uploaded file is empty"))?;
        let headers = split_csv_line(header_line)
            .into_iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let rows = lines.map(split_csv_line).collect();
        Ok(Self { headers, rows })
    }

    /// Returns the trimmed value of a named column; empty cells count as
    /// missing.
    fn get<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == name)?;
        row.get(idx).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// Reads the uploaded file part as UTF-8 text.
async fn read_upload(mut multipart: Multipart) -> Result<String, HttpError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::validation(format!("failed to read multipart data: {e}")))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| HttpError::validation(format!("failed to read file bytes: {e}")))?;
        return String::from_utf8(data.to_vec())
            .map_err(|_| HttpError::validation("uploaded file is not valid UTF-8"));
    }
    Err(HttpError::validation("multipart form must include a file"))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/upload/governorates - Columns: `name`, `code`.
pub async fn governorates_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    multipart: Multipart,
) -> HttpResult<Json<ImportReport>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let sheet = CsvSheet::parse(&read_upload(multipart).await?)?;

    let mut report = ImportReport::default();
    for (i, row) in sheet.rows.iter().enumerate() {
        let line = i + 2;
        let (Some(name), Some(code)) = (sheet.get(row, "name"), sheet.get(row, "code")) else {
            report.skip(line, "name and code are required");
            continue;
        };
        match state.db.upsert_governorate(name, code).await {
            Ok(_) => report.imported += 1,
            Err(PortError::Conflict(m)) => report.skip(line, m),
            Err(e) => return Err(e.into()),
        }
    }

    info!(imported = report.imported, skipped = report.skipped, "governorate import");
    Ok(Json(report))
}

/// POST /api/upload/hospitals - Columns: `code`, `name`, optional
/// `governorate` (by name) and the five bed counters.
pub async fn hospitals_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    multipart: Multipart,
) -> HttpResult<Json<ImportReport>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let sheet = CsvSheet::parse(&read_upload(multipart).await?)?;
    let governorates = state.db.list_governorates().await?;

    let mut report = ImportReport::default();
    for (i, row) in sheet.rows.iter().enumerate() {
        let line = i + 2;
        let (Some(code), Some(name)) = (sheet.get(row, "code"), sheet.get(row, "name")) else {
            report.skip(line, "code and name are required");
            continue;
        };

        let governorate_id = match sheet.get(row, "governorate") {
            Some(gov_name) => {
                match governorates.iter().find(|g| g.name.eq_ignore_ascii_case(gov_name)) {
                    Some(g) => Some(g.id),
                    None => {
                        report.skip(line, format!("unknown governorate '{gov_name}'"));
                        continue;
                    }
                }
            }
            None => None,
        };

        let bed = |column: &str| -> Result<i32, String> {
            match sheet.get(row, column) {
                Some(raw) => raw
                    .parse::<i32>()
                    .ok()
                    .filter(|n| *n >= 0)
                    .ok_or_else(|| format!("{column} must be a non-negative integer")),
                None => Ok(0),
            }
        };
        let beds: Result<Vec<i32>, String> = [
            "icu_beds",
            "pediatric_beds",
            "incubators",
            "newborn_beds",
            "medium_care_beds",
        ]
        .iter()
        .map(|c| bed(c))
        .collect();
        let beds = match beds {
            Ok(beds) => beds,
            Err(message) => {
                report.skip(line, message);
                continue;
            }
        };

        match state
            .db
            .upsert_hospital(NewHospital {
                code: code.to_string(),
                name: name.to_string(),
                governorate_id,
                icu_beds: beds[0],
                pediatric_beds: beds[1],
                incubators: beds[2],
                newborn_beds: beds[3],
                medium_care_beds: beds[4],
            })
            .await
        {
            Ok(_) => report.imported += 1,
            Err(PortError::Conflict(m)) => report.skip(line, m),
            Err(e) => return Err(e.into()),
        }
    }

    info!(imported = report.imported, skipped = report.skipped, "hospital import");
    Ok(Json(report))
}

/// POST /api/upload/patients - Columns: `full_name`, `national_id`,
/// `hospital_code`, plus optional demographics. Gender is decoded from the
/// national identifier.
pub async fn patients_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    multipart: Multipart,
) -> HttpResult<Json<ImportReport>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let sheet = CsvSheet::parse(&read_upload(multipart).await?)?;

    let mut report = ImportReport::default();
    for (i, row) in sheet.rows.iter().enumerate() {
        let line = i + 2;
        let (Some(full_name), Some(raw_id), Some(hospital_code)) = (
            sheet.get(row, "full_name"),
            sheet.get(row, "national_id"),
            sheet.get(row, "hospital_code"),
        ) else {
            report.skip(line, "full_name, national_id and hospital_code are required");
            continue;
        };

        let national_id = match NationalId::parse(raw_id) {
            Ok(id) => id,
            Err(e) => {
                report.skip(line, e);
                continue;
            }
        };
        let hospital_id: Uuid = match state.db.get_hospital_by_code(hospital_code).await? {
            Some(hospital) => hospital.id,
            None => {
                report.skip(line, format!("unknown hospital code '{hospital_code}'"));
                continue;
            }
        };
        let admission_date = match sheet.get(row, "admission_date") {
            Some(raw) => match raw.parse::<NaiveDate>() {
                Ok(date) => Some(date),
                Err(_) => {
                    report.skip(line, "admission_date must be YYYY-MM-DD");
                    continue;
                }
            },
            None => None,
        };

        match state
            .db
            .create_patient(NewPatient {
                report_number: sheet.get(row, "report_number").map(str::to_string),
                full_name: full_name.to_string(),
                national_id: national_id.raw.clone(),
                gender: Some(national_id.gender),
                governorate: sheet.get(row, "governorate").map(str::to_string),
                phone: sheet.get(row, "phone").map(str::to_string),
                referral_source: sheet.get(row, "referral_source").map(str::to_string),
                admission_date,
                initial_diagnosis: sheet.get(row, "initial_diagnosis").map(str::to_string),
                direct_transfer: false,
                hospital_id,
            })
            .await
        {
            Ok(_) => report.imported += 1,
            Err(PortError::Conflict(m)) => report.skip(line, m),
            Err(e) => return Err(e.into()),
        }
    }

    info!(imported = report.imported, skipped = report.skipped, "patient import");
    Ok(Json(report))
}
