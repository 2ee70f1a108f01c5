//! crates/hospital_core/src/ports.rs
//!
//! Defines the service contract (trait) for the application's persistence.
//! This trait forms the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete database implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    AuthSession, Gender, Governorate, Hospital, MedicalService, MedicalStandard, Patient,
    PatientStatus, PermissionSet, Protocol, Role, User,
};
use crate::transfer::{TransferOutcome, TransferRequest, TransferStatus};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the storage engine.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// The transfer request was already in a terminal state when the
    /// conditional update ran.
    #[error("transfer request already resolved")]
    AlreadyResolved,
    #[error("an unexpected storage error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Port Input / Output Records
//=========================================================================================

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub active_role: String,
    pub hospital_id: Option<Uuid>,
}

/// A full-record user edit. Administrative edits replace every mutable field
/// except the password, which has its own operations.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub active_role: String,
    pub hospital_id: Option<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone)]
pub struct NewHospital {
    pub code: String,
    pub name: String,
    pub governorate_id: Option<Uuid>,
    pub icu_beds: i32,
    pub pediatric_beds: i32,
    pub incubators: i32,
    pub newborn_beds: i32,
    pub medium_care_beds: i32,
}

#[derive(Debug, Clone, Default)]
pub struct HospitalUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub governorate_id: Option<Uuid>,
    pub icu_beds: Option<i32>,
    pub pediatric_beds: Option<i32>,
    pub incubators: Option<i32>,
    pub newborn_beds: Option<i32>,
    pub medium_care_beds: Option<i32>,
}

/// Search, filter and pagination parameters for the hospital list.
#[derive(Debug, Clone)]
pub struct HospitalFilter {
    pub search: Option<String>,
    pub governorate: Option<String>,
    pub min_icu_beds: Option<i32>,
    pub min_pediatric_beds: Option<i32>,
    pub min_incubators: Option<i32>,
    pub min_newborn_beds: Option<i32>,
    pub min_medium_care_beds: Option<i32>,
    pub page: i64,
    pub limit: i64,
}

impl Default for HospitalFilter {
    fn default() -> Self {
        Self {
            search: None,
            governorate: None,
            min_icu_beds: None,
            min_pediatric_beds: None,
            min_incubators: None,
            min_newborn_beds: None,
            min_medium_care_beds: None,
            page: 1,
            limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HospitalPage {
    pub data: Vec<Hospital>,
    pub total_filtered: i64,
    pub total_all: i64,
    pub page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub report_number: Option<String>,
    pub full_name: String,
    pub national_id: String,
    pub gender: Option<Gender>,
    pub governorate: Option<String>,
    pub phone: Option<String>,
    pub referral_source: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub initial_diagnosis: Option<String>,
    pub direct_transfer: bool,
    pub hospital_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct PatientUpdate {
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

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub patient_id: Uuid,
    pub from_hospital: String,
    pub to_hospital: String,
    pub reason: String,
    pub requested_by: Option<Uuid>,
}

/// A light reference to a patient, embedded in transfer listings.
#[derive(Debug, Clone, Serialize)]
pub struct PatientRef {
    pub id: Uuid,
    pub full_name: String,
    pub national_id: String,
}

/// A light reference to a user, embedded in transfer listings.
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// A pending transfer joined with patient, requester and approver identity.
#[derive(Debug, Clone, Serialize)]
pub struct PendingTransfer {
    pub id: Uuid,
    pub patient: PatientRef,
    pub requester: Option<UserRef>,
    pub approver: Option<UserRef>,
    pub from_hospital: String,
    pub to_hospital: String,
    pub reason: String,
    pub status: TransferStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A transfer request together with the facts the authorization check needs
/// about its patient.
#[derive(Debug, Clone)]
pub struct TransferWithPatient {
    pub request: TransferRequest,
    pub patient_hospital_id: Uuid,
    pub patient_name: String,
}

/// A denormalized transfer row for file export.
#[derive(Debug, Clone, Serialize)]
pub struct TransferExportRow {
    pub patient_name: String,
    pub national_id: String,
    pub from_hospital: String,
    pub to_hospital: String,
    pub reason: String,
    pub status: TransferStatus,
    pub requested_by: Option<String>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiCounts {
    pub total_patients: i64,
    pub pending_transfers: i64,
    pub total_hospitals: i64,
    pub occupied_icu_beds: i64,
    pub total_icu_beds: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub code: String,
    pub kind: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewProtocol {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProtocolUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewStandard {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub criteria: String,
}

#[derive(Debug, Clone, Default)]
pub struct StandardUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub criteria: Option<String>,
    pub is_active: Option<bool>,
}

//=========================================================================================
// Service Port (Trait)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    /// Returns `None` for an unknown email so the caller can collapse it
    /// into `InvalidCredentials` without leaking account existence.
    async fn get_user_by_email(&self, email: &str) -> PortResult<Option<User>>;
    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;
    async fn list_users(&self, hospital_scope: Option<Uuid>) -> PortResult<Vec<User>>;
    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;
    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> PortResult<User>;
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()>;
    async fn toggle_user_active(&self, user_id: Uuid) -> PortResult<User>;
    async fn record_login(
        &self,
        user_id: Uuid,
        active_role: &str,
        at: DateTime<Utc>,
    ) -> PortResult<User>;
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> PortResult<()>;
    async fn find_user_with_role(&self, role: &str) -> PortResult<Option<User>>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        token: &str,
        user_id: Uuid,
        role: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;
    async fn get_auth_session(&self, token: &str) -> PortResult<Option<AuthSession>>;
    /// Idempotent: deleting a missing session is not an error.
    async fn delete_auth_session(&self, token: &str) -> PortResult<()>;
    async fn delete_sessions_for_user(&self, user_id: Uuid) -> PortResult<u64>;

    // --- Roles ---
    async fn list_roles(&self) -> PortResult<Vec<Role>>;
    async fn create_role(&self, new_role: NewRole) -> PortResult<Role>;
    async fn update_role(&self, role_id: Uuid, update: NewRole) -> PortResult<Role>;
    /// Fails with `Conflict` while any user still references the role name.
    async fn delete_role(&self, role_id: Uuid) -> PortResult<()>;

    // --- Governorates ---
    async fn list_governorates(&self) -> PortResult<Vec<Governorate>>;
    async fn create_governorate(&self, name: &str, code: &str) -> PortResult<Governorate>;
    async fn update_governorate(
        &self,
        governorate_id: Uuid,
        name: Option<&str>,
        code: Option<&str>,
    ) -> PortResult<Governorate>;
    async fn delete_governorate(&self, governorate_id: Uuid) -> PortResult<()>;
    /// Create-or-return by unique name, used by bulk import.
    async fn upsert_governorate(&self, name: &str, code: &str) -> PortResult<Governorate>;

    // --- Hospitals ---
    async fn list_hospitals(&self, filter: HospitalFilter) -> PortResult<HospitalPage>;
    async fn get_hospital(&self, hospital_id: Uuid) -> PortResult<Hospital>;
    async fn get_hospital_by_code(&self, code: &str) -> PortResult<Option<Hospital>>;
    async fn create_hospital(&self, new_hospital: NewHospital) -> PortResult<Hospital>;
    async fn update_hospital(
        &self,
        hospital_id: Uuid,
        update: HospitalUpdate,
    ) -> PortResult<Hospital>;
    async fn delete_hospital(&self, hospital_id: Uuid) -> PortResult<()>;
    /// Create-or-update keyed on the unique hospital code, used by bulk import.
    async fn upsert_hospital(&self, new_hospital: NewHospital) -> PortResult<Hospital>;

    // --- Patients ---
    async fn list_patients(&self, hospital_scope: Option<Uuid>) -> PortResult<Vec<Patient>>;
    async fn get_patient(&self, patient_id: Uuid) -> PortResult<Patient>;
    /// Fails with `Conflict` on a duplicate national identifier.
    async fn create_patient(&self, new_patient: NewPatient) -> PortResult<Patient>;
    async fn update_patient(
        &self,
        patient_id: Uuid,
        update: PatientUpdate,
    ) -> PortResult<Patient>;
    async fn delete_patient(&self, patient_id: Uuid) -> PortResult<()>;

    // --- Transfer Requests ---
    async fn create_transfer(&self, new_transfer: NewTransfer) -> PortResult<TransferRequest>;
    async fn get_transfer(&self, transfer_id: Uuid) -> PortResult<TransferWithPatient>;
    async fn list_pending_transfers(&self) -> PortResult<Vec<PendingTransfer>>;
    /// Resolves a pending request and applies the patient-side effect in one
    /// transaction. The status transition is a conditional update keyed on
    /// the `pending` state; when it matches no row the request was already
    /// resolved and the call fails with [`PortError::AlreadyResolved`].
    async fn resolve_transfer(
        &self,
        transfer_id: Uuid,
        outcome: TransferOutcome,
        resolved_by: Uuid,
        notes: &str,
    ) -> PortResult<TransferRequest>;
    async fn list_transfers(&self) -> PortResult<Vec<TransferExportRow>>;

    // --- Analytics ---
    async fn kpi_counts(&self) -> PortResult<KpiCounts>;
    async fn daily_patient_counts(&self, since: DateTime<Utc>) -> PortResult<Vec<DailyCount>>;
    async fn patients_by_governorate(&self) -> PortResult<Vec<GroupCount>>;
    async fn transfers_by_hospital(&self) -> PortResult<Vec<GroupCount>>;

    // --- Medical Services ---
    async fn list_services(&self) -> PortResult<Vec<MedicalService>>;
    async fn create_service(&self, new_service: NewService) -> PortResult<MedicalService>;
    async fn update_service(
        &self,
        service_id: Uuid,
        update: ServiceUpdate,
    ) -> PortResult<MedicalService>;
    async fn delete_service(&self, service_id: Uuid) -> PortResult<()>;
    async fn toggle_service_active(&self, service_id: Uuid) -> PortResult<MedicalService>;

    // --- Treatment Protocols ---
    async fn list_protocols(&self) -> PortResult<Vec<Protocol>>;
    /// Fails with `Conflict` on a duplicate protocol code.
    async fn create_protocol(&self, new_protocol: NewProtocol) -> PortResult<Protocol>;
    async fn update_protocol(
        &self,
        protocol_id: Uuid,
        update: ProtocolUpdate,
    ) -> PortResult<Protocol>;
    async fn delete_protocol(&self, protocol_id: Uuid) -> PortResult<()>;
    async fn toggle_protocol_active(&self, protocol_id: Uuid) -> PortResult<Protocol>;

    // --- Medical Standards ---
    async fn list_standards(&self) -> PortResult<Vec<MedicalStandard>>;
    async fn create_standard(&self, new_standard: NewStandard) -> PortResult<MedicalStandard>;
    async fn update_standard(
        &self,
        standard_id: Uuid,
        update: StandardUpdate,
    ) -> PortResult<MedicalStandard>;
    async fn delete_standard(&self, standard_id: Uuid) -> PortResult<()>;
    async fn toggle_standard_active(&self, standard_id: Uuid) -> PortResult<MedicalStandard>;
}
