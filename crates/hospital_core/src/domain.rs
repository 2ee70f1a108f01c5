//! crates/hospital_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or web framework.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Represents a staff account. The password hash never leaves the service
/// boundary; see [`PublicUser`] for the client-facing projection.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub active_role: String,
    pub hospital_id: Option<Uuid>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
}

/// The minimal identity returned to the client after login or a session check.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub active_role: String,
    pub hospital_id: Option<Uuid>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
            active_role: self.active_role.clone(),
            hospital_id: self.hospital_id,
            last_login: self.last_login,
        }
    }
}

/// Represents a browser login session (auth cookie). The token is opaque to
/// the client; everything else lives server-side.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// The closed set of resources a role's permission bundle can speak about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Patients,
    Hospitals,
    Users,
    Roles,
    Services,
    Standards,
    Governorates,
    Transfers,
    Analytics,
    Exports,
}

/// The actions a role may be granted on a single resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionGrants {
    pub view: bool,
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
}

/// A typed permission bundle: resource -> granted actions. Persisted as JSON,
/// but only this closed schema round-trips; arbitrary maps are rejected at
/// deserialization time.
pub type PermissionSet = BTreeMap<Resource, ActionGrants>;

/// A named permission bundle assignable to users.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct Governorate {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

/// A facility record with its bed-capacity counters.
#[derive(Debug, Clone, Serialize)]
pub struct Hospital {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub governorate_id: Option<Uuid>,
    pub governorate_name: Option<String>,
    pub icu_beds: i32,
    pub pediatric_beds: i32,
    pub incubators: i32,
    pub newborn_beds: i32,
    pub medium_care_beds: i32,
}

/// Lifecycle states of a patient record within its owning hospital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Admitted,
    Transferred,
    TransferRejected,
    Discharged,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Admitted => "admitted",
            PatientStatus::Transferred => "transferred",
            PatientStatus::TransferRejected => "transfer_rejected",
            PatientStatus::Discharged => "discharged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admitted" => Some(PatientStatus::Admitted),
            "transferred" => Some(PatientStatus::Transferred),
            "transfer_rejected" => Some(PatientStatus::TransferRejected),
            "discharged" => Some(PatientStatus::Discharged),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// A registration/clinical record, scoped to exactly one hospital at a time.
#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: Uuid,
    pub report_number: Option<String>,
    pub full_name: String,
    pub national_id: String,
    pub gender: Option<Gender>,
    pub governorate: Option<String>,
    pub phone: Option<String>,
    pub referral_source: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub initial_diagnosis: Option<String>,
    pub status: PatientStatus,
    pub transfer_to_other: bool,
    pub direct_transfer: bool,
    pub discharge_status: Option<String>,
    pub discharge_date: Option<NaiveDate>,
    pub hospital_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog entry for a medical service offered by the organization.
#[derive(Debug, Clone, Serialize)]
pub struct MedicalService {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub kind: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// A treatment protocol in the organization-wide catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Protocol {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// A quality/accreditation standard tracked by the organization.
#[derive(Debug, Clone, Serialize)]
pub struct MedicalStandard {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub criteria: String,
    pub is_active: bool,
}

/// A validation failure on a domain field, surfaced to the client verbatim.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// A parsed 14-digit national identifier.
///
/// Layout: `C YYMMDD GG SSSS X` where `C` selects the century (2 => 1900s,
/// 3 => 2000s), `YYMMDD` is the birth date, `GG` the issuing governorate code
/// and the 13th digit encodes gender (odd male, even female). There is no
/// checksum digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NationalId {
    pub raw: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub governorate_code: String,
}

impl NationalId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.len() != 14 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError(
                "national id must be exactly 14 digits".to_string(),
            ));
        }
        let digit = |i: usize| (raw.as_bytes()[i] - b'0') as i32;

        let century = match digit(0) {
            2 => 1900,
            3 => 2000,
            other => {
                return Err(ValidationError(format!(
                    "national id has invalid century digit '{other}'"
                )))
            }
        };
        let year = century + digit(1) * 10 + digit(2);
        let month = (digit(3) * 10 + digit(4)) as u32;
        let day = (digit(5) * 10 + digit(6)) as u32;
        let birth_date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            ValidationError("national id encodes an invalid birth date".to_string())
        })?;

        let gender = if digit(12) % 2 == 1 {
            Gender::Male
        } else {
            Gender::Female
        };

        Ok(NationalId {
            raw: raw.to_string(),
            birth_date,
            gender,
            governorate_code: raw[7..9].to_string(),
        })
    }
}
