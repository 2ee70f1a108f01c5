//! Shared test harness: an in-memory `DatabaseService` implementation and
//! helpers to drive the real router with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

use api_lib::config::Config;
use api_lib::password::hash_password;
use api_lib::web::{build_router, state::AppState};
use hospital_core::auth::{DOCTOR, HOSPITAL_ADMIN, SYSTEM_ADMIN};
use hospital_core::domain::{
    AuthSession, Gender, Governorate, Hospital, MedicalService, MedicalStandard, Patient,
    PatientStatus, Protocol, Role, User,
};
use hospital_core::ports::{
    DailyCount, DatabaseService, GroupCount, HospitalFilter, HospitalPage, HospitalUpdate,
    KpiCounts, NewHospital, NewPatient, NewProtocol, NewRole, NewService, NewStandard,
    NewTransfer, NewUser, PatientRef, PatientUpdate, PendingTransfer, PortError, PortResult,
    ProtocolUpdate, ServiceUpdate, StandardUpdate, TransferExportRow, TransferWithPatient,
    UserRef,
};
use hospital_core::transfer::{TransferOutcome, TransferRequest, TransferStatus};

//=========================================================================================
// In-Memory Database
//=========================================================================================

#[derive(Default)]
struct MockState {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, AuthSession>,
    roles: HashMap<Uuid, Role>,
    governorates: HashMap<Uuid, Governorate>,
    hospitals: HashMap<Uuid, Hospital>,
    patients: HashMap<Uuid, Patient>,
    transfers: HashMap<Uuid, TransferRequest>,
    services: HashMap<Uuid, MedicalService>,
    protocols: HashMap<Uuid, Protocol>,
    standards: HashMap<Uuid, MedicalStandard>,
}

/// An in-memory stand-in for the PostgreSQL adapter. A single mutex makes
/// every operation atomic, which is exactly what the resolution tests rely
/// on.
#[derive(Default)]
pub struct MockDb {
    state: Mutex<MockState>,
}

impl MockDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // --- direct fixture insertion ---

    pub fn insert_hospital(&self, name: &str, code: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().hospitals.insert(
            id,
            Hospital {
                id,
                code: code.to_string(),
                name: name.to_string(),
                governorate_id: None,
                governorate_name: None,
                icu_beds: 10,
                pediatric_beds: 5,
                incubators: 2,
                newborn_beds: 4,
                medium_care_beds: 6,
            },
        );
        id
    }

    pub fn insert_user(
        &self,
        email: &str,
        password: &str,
        roles: &[&str],
        hospital_id: Option<Uuid>,
        is_active: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let user = User {
            id,
            name: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            password_hash: hash_password(password).unwrap(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            active_role: roles[0].to_string(),
            hospital_id,
            is_active,
            last_login: None,
        };
        self.state.lock().unwrap().users.insert(id, user);
        id
    }

    pub fn insert_patient(&self, national_id: &str, hospital_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.state.lock().unwrap().patients.insert(
            id,
            Patient {
                id,
                report_number: None,
                full_name: "Test Patient".to_string(),
                national_id: national_id.to_string(),
                gender: Some(Gender::Male),
                governorate: None,
                phone: None,
                referral_source: None,
                admission_date: None,
                initial_diagnosis: None,
                status: PatientStatus::Admitted,
                transfer_to_other: false,
                direct_transfer: false,
                discharge_status: None,
                discharge_date: None,
                hospital_id,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn insert_pending_transfer(&self, patient_id: Uuid, requested_by: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.state.lock().unwrap().transfers.insert(
            id,
            TransferRequest {
                id,
                patient_id,
                from_hospital: "Source Hospital".to_string(),
                to_hospital: "Destination Hospital".to_string(),
                reason: "specialized care".to_string(),
                status: TransferStatus::Pending,
                notes: None,
                requested_by: Some(requested_by),
                approved_by: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Creates a live session directly and returns the cookie value.
    pub fn insert_session(&self, user_id: Uuid, role: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.state.lock().unwrap().sessions.insert(
            token.clone(),
            AuthSession {
                token: token.clone(),
                user_id,
                role: role.to_string(),
                created_at: now,
                expires_at: now + Duration::hours(24),
            },
        );
        token
    }

    pub fn insert_expired_session(&self, user_id: Uuid, role: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.state.lock().unwrap().sessions.insert(
            token.clone(),
            AuthSession {
                token: token.clone(),
                user_id,
                role: role.to_string(),
                created_at: now - Duration::hours(48),
                expires_at: now - Duration::hours(24),
            },
        );
        token
    }

    pub fn set_user_active(&self, user_id: Uuid, is_active: bool) {
        if let Some(user) = self.state.lock().unwrap().users.get_mut(&user_id) {
            user.is_active = is_active;
        }
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn patient(&self, id: Uuid) -> Option<Patient> {
        self.state.lock().unwrap().patients.get(&id).cloned()
    }

    pub fn transfer(&self, id: Uuid) -> Option<TransferRequest> {
        self.state.lock().unwrap().transfers.get(&id).cloned()
    }
}

#[async_trait]
impl DatabaseService for MockDb {
    // --- Users ---

    async fn get_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let state = self.state.lock().unwrap();
        state
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("user {user_id}")))
    }

    async fn list_users(&self, hospital_scope: Option<Uuid>) -> PortResult<Vec<User>> {
        let state = self.state.lock().unwrap();
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| hospital_scope.is_none() || u.hospital_id == hospital_scope)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut state = self.state.lock().unwrap();
        if state.users.values().any(|u| u.email == new_user.email) {
            return Err(PortError::Conflict("user email: duplicate value".into()));
        }
        let id = Uuid::new_v4();
        let user = User {
            id,
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            roles: new_user.roles,
            active_role: new_user.active_role,
            hospital_id: new_user.hospital_id,
            is_active: true,
            last_login: None,
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        update: hospital_core::ports::UserUpdate,
    ) -> PortResult<User> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("user {user_id}")))?;
        user.name = update.name;
        user.email = update.email;
        user.roles = update.roles;
        user.active_role = update.active_role;
        user.hospital_id = update.hospital_id;
        user.is_active = update.is_active;
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .users
            .remove(&user_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("user {user_id}")))
    }

    async fn toggle_user_active(&self, user_id: Uuid) -> PortResult<User> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("user {user_id}")))?;
        user.is_active = !user.is_active;
        Ok(user.clone())
    }

    async fn record_login(
        &self,
        user_id: Uuid,
        active_role: &str,
        at: DateTime<Utc>,
    ) -> PortResult<User> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("user {user_id}")))?;
        user.last_login = Some(at);
        user.active_role = active_role.to_string();
        Ok(user.clone())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("user {user_id}")))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn find_user_with_role(&self, role: &str) -> PortResult<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .find(|u| u.roles.iter().any(|r| r == role))
            .cloned())
    }

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        token: &str,
        user_id: Uuid,
        role: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state.sessions.insert(
            token.to_string(),
            AuthSession {
                token: token.to_string(),
                user_id,
                role: role.to_string(),
                created_at: Utc::now(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_auth_session(&self, token: &str) -> PortResult<Option<AuthSession>> {
        let state = self.state.lock().unwrap();
        Ok(state.sessions.get(token).cloned())
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state.sessions.remove(token);
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> PortResult<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    // --- Roles ---

    async fn list_roles(&self) -> PortResult<Vec<Role>> {
        let state = self.state.lock().unwrap();
        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create_role(&self, new_role: NewRole) -> PortResult<Role> {
        let mut state = self.state.lock().unwrap();
        if state.roles.values().any(|r| r.name == new_role.name) {
            return Err(PortError::Conflict("role name: duplicate value".into()));
        }
        let id = Uuid::new_v4();
        let role = Role {
            id,
            name: new_role.name,
            display_name: new_role.display_name,
            description: new_role.description,
            permissions: new_role.permissions,
        };
        state.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, role_id: Uuid, update: NewRole) -> PortResult<Role> {
        let mut state = self.state.lock().unwrap();
        let role = state
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| PortError::NotFound(format!("role {role_id}")))?;
        role.name = update.name;
        role.display_name = update.display_name;
        role.description = update.description;
        role.permissions = update.permissions;
        Ok(role.clone())
    }

    async fn delete_role(&self, role_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let name = state
            .roles
            .get(&role_id)
            .map(|r| r.name.clone())
            .ok_or_else(|| PortError::NotFound(format!("role {role_id}")))?;
        let referencing = state
            .users
            .values()
            .filter(|u| u.roles.iter().any(|r| *r == name))
            .count();
        if referencing > 0 {
            return Err(PortError::Conflict(format!(
                "role '{name}' is still assigned to {referencing} user(s)"
            )));
        }
        state.roles.remove(&role_id);
        Ok(())
    }

    // --- Governorates ---

    async fn list_governorates(&self) -> PortResult<Vec<Governorate>> {
        let state = self.state.lock().unwrap();
        let mut all: Vec<Governorate> = state.governorates.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn create_governorate(&self, name: &str, code: &str) -> PortResult<Governorate> {
        let mut state = self.state.lock().unwrap();
        if state
            .governorates
            .values()
            .any(|g| g.name == name || g.code == code)
        {
            return Err(PortError::Conflict(
                "governorate name/code: duplicate value".into(),
            ));
        }
        let id = Uuid::new_v4();
        let governorate = Governorate {
            id,
            name: name.to_string(),
            code: code.to_string(),
        };
        state.governorates.insert(id, governorate.clone());
        Ok(governorate)
    }

    async fn update_governorate(
        &self,
        governorate_id: Uuid,
        name: Option<&str>,
        code: Option<&str>,
    ) -> PortResult<Governorate> {
        let mut state = self.state.lock().unwrap();
        let governorate = state
            .governorates
            .get_mut(&governorate_id)
            .ok_or_else(|| PortError::NotFound(format!("governorate {governorate_id}")))?;
        if let Some(name) = name {
            governorate.name = name.to_string();
        }
        if let Some(code) = code {
            governorate.code = code.to_string();
        }
        Ok(governorate.clone())
    }

    async fn delete_governorate(&self, governorate_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .governorates
            .remove(&governorate_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("governorate {governorate_id}")))
    }

    async fn upsert_governorate(&self, name: &str, code: &str) -> PortResult<Governorate> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(existing) = state.governorates.values_mut().find(|g| g.name == name) {
                existing.code = code.to_string();
                return Ok(existing.clone());
            }
        }
        self.create_governorate(name, code).await
    }

    // --- Hospitals ---

    async fn list_hospitals(&self, filter: HospitalFilter) -> PortResult<HospitalPage> {
        let state = self.state.lock().unwrap();
        let total_all = state.hospitals.len() as i64;
        let matches = |h: &Hospital| -> bool {
            if let Some(search) = filter.search.as_deref() {
                let s = search.to_lowercase();
                let hit = h.code.to_lowercase().contains(&s)
                    || h.name.to_lowercase().contains(&s)
                    || h.governorate_name
                        .as_deref()
                        .is_some_and(|g| g.to_lowercase().contains(&s));
                if !hit {
                    return false;
                }
            }
            if let Some(gov) = filter.governorate.as_deref() {
                if h.governorate_name.as_deref() != Some(gov) {
                    return false;
                }
            }
            filter.min_icu_beds.is_none_or(|m| h.icu_beds >= m)
                && filter.min_pediatric_beds.is_none_or(|m| h.pediatric_beds >= m)
                && filter.min_incubators.is_none_or(|m| h.incubators >= m)
                && filter.min_newborn_beds.is_none_or(|m| h.newborn_beds >= m)
                && filter
                    .min_medium_care_beds
                    .is_none_or(|m| h.medium_care_beds >= m)
        };
        let mut filtered: Vec<Hospital> = state.hospitals.values().filter(|h| matches(h)).cloned().collect();
        filtered.sort_by(|a, b| a.name.cmp(&b.name));
        let total_filtered = filtered.len() as i64;
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 1000);
        let start = ((page - 1) * limit) as usize;
        let data: Vec<Hospital> = filtered.into_iter().skip(start).take(limit as usize).collect();
        Ok(HospitalPage {
            data,
            total_filtered,
            total_all,
            page,
            total_pages: (total_filtered + limit - 1) / limit,
        })
    }

    async fn get_hospital(&self, hospital_id: Uuid) -> PortResult<Hospital> {
        let state = self.state.lock().unwrap();
        state
            .hospitals
            .get(&hospital_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("hospital {hospital_id}")))
    }

    async fn get_hospital_by_code(&self, code: &str) -> PortResult<Option<Hospital>> {
        let state = self.state.lock().unwrap();
        Ok(state.hospitals.values().find(|h| h.code == code).cloned())
    }

    async fn create_hospital(&self, new_hospital: NewHospital) -> PortResult<Hospital> {
        let mut state = self.state.lock().unwrap();
        if state.hospitals.values().any(|h| h.code == new_hospital.code) {
            return Err(PortError::Conflict("hospital code: duplicate value".into()));
        }
        let governorate_name = new_hospital
            .governorate_id
            .and_then(|g| state.governorates.get(&g))
            .map(|g| g.name.clone());
        let id = Uuid::new_v4();
        let hospital = Hospital {
            id,
            code: new_hospital.code,
            name: new_hospital.name,
            governorate_id: new_hospital.governorate_id,
            governorate_name,
            icu_beds: new_hospital.icu_beds,
            pediatric_beds: new_hospital.pediatric_beds,
            incubators: new_hospital.incubators,
            newborn_beds: new_hospital.newborn_beds,
            medium_care_beds: new_hospital.medium_care_beds,
        };
        state.hospitals.insert(id, hospital.clone());
        Ok(hospital)
    }

    async fn update_hospital(
        &self,
        hospital_id: Uuid,
        update: HospitalUpdate,
    ) -> PortResult<Hospital> {
        let mut state = self.state.lock().unwrap();
        let hospital = state
            .hospitals
            .get_mut(&hospital_id)
            .ok_or_else(|| PortError::NotFound(format!("hospital {hospital_id}")))?;
        if let Some(code) = update.code {
            hospital.code = code;
        }
        if let Some(name) = update.name {
            hospital.name = name;
        }
        if let Some(governorate_id) = update.governorate_id {
            hospital.governorate_id = Some(governorate_id);
        }
        if let Some(v) = update.icu_beds {
            hospital.icu_beds = v;
        }
        if let Some(v) = update.pediatric_beds {
            hospital.pediatric_beds = v;
        }
        if let Some(v) = update.incubators {
            hospital.incubators = v;
        }
        if let Some(v) = update.newborn_beds {
            hospital.newborn_beds = v;
        }
        if let Some(v) = update.medium_care_beds {
            hospital.medium_care_beds = v;
        }
        Ok(hospital.clone())
    }

    async fn delete_hospital(&self, hospital_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.patients.values().any(|p| p.hospital_id == hospital_id) {
            return Err(PortError::Conflict(
                "hospital: referenced by other records".into(),
            ));
        }
        state
            .hospitals
            .remove(&hospital_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("hospital {hospital_id}")))
    }

    async fn upsert_hospital(&self, new_hospital: NewHospital) -> PortResult<Hospital> {
        {
            let mut state = self.state.lock().unwrap();
            let governorate_name = new_hospital
                .governorate_id
                .and_then(|g| state.governorates.get(&g))
                .map(|g| g.name.clone());
            if let Some(existing) = state
                .hospitals
                .values_mut()
                .find(|h| h.code == new_hospital.code)
            {
                existing.name = new_hospital.name.clone();
                if new_hospital.governorate_id.is_some() {
                    existing.governorate_id = new_hospital.governorate_id;
                    existing.governorate_name = governorate_name;
                }
                existing.icu_beds = new_hospital.icu_beds;
                existing.pediatric_beds = new_hospital.pediatric_beds;
                existing.incubators = new_hospital.incubators;
                existing.newborn_beds = new_hospital.newborn_beds;
                existing.medium_care_beds = new_hospital.medium_care_beds;
                return Ok(existing.clone());
            }
        }
        self.create_hospital(new_hospital).await
    }

    // --- Patients ---

    async fn list_patients(&self, hospital_scope: Option<Uuid>) -> PortResult<Vec<Patient>> {
        let state = self.state.lock().unwrap();
        let mut patients: Vec<Patient> = state
            .patients
            .values()
            .filter(|p| hospital_scope.is_none() || Some(p.hospital_id) == hospital_scope)
            .cloned()
            .collect();
        patients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(patients)
    }

    async fn get_patient(&self, patient_id: Uuid) -> PortResult<Patient> {
        let state = self.state.lock().unwrap();
        state
            .patients
            .get(&patient_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("patient {patient_id}")))
    }

    async fn create_patient(&self, new_patient: NewPatient) -> PortResult<Patient> {
        let mut state = self.state.lock().unwrap();
        if state
            .patients
            .values()
            .any(|p| p.national_id == new_patient.national_id)
        {
            return Err(PortError::Conflict(
                "patient national id: duplicate value".into(),
            ));
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        let patient = Patient {
            id,
            report_number: new_patient.report_number,
            full_name: new_patient.full_name,
            national_id: new_patient.national_id,
            gender: new_patient.gender,
            governorate: new_patient.governorate,
            phone: new_patient.phone,
            referral_source: new_patient.referral_source,
            admission_date: new_patient.admission_date,
            initial_diagnosis: new_patient.initial_diagnosis,
            status: PatientStatus::Admitted,
            transfer_to_other: false,
            direct_transfer: new_patient.direct_transfer,
            discharge_status: None,
            discharge_date: None,
            hospital_id: new_patient.hospital_id,
            created_at: now,
            updated_at: now,
        };
        state.patients.insert(id, patient.clone());
        Ok(patient)
    }

    async fn update_patient(
        &self,
        patient_id: Uuid,
        update: PatientUpdate,
    ) -> PortResult<Patient> {
        let mut state = self.state.lock().unwrap();
        let patient = state
            .patients
            .get_mut(&patient_id)
            .ok_or_else(|| PortError::NotFound(format!("patient {patient_id}")))?;
        if let Some(v) = update.full_name {
            patient.full_name = v;
        }
        if let Some(v) = update.phone {
            patient.phone = Some(v);
        }
        if let Some(v) = update.governorate {
            patient.governorate = Some(v);
        }
        if let Some(v) = update.referral_source {
            patient.referral_source = Some(v);
        }
        if let Some(v) = update.initial_diagnosis {
            patient.initial_diagnosis = Some(v);
        }
        if let Some(v) = update.status {
            patient.status = v;
        }
        if let Some(v) = update.discharge_status {
            patient.discharge_status = Some(v);
        }
        if let Some(v) = update.discharge_date {
            patient.discharge_date = Some(v);
        }
        if let Some(v) = update.hospital_id {
            patient.hospital_id = v;
        }
        patient.updated_at = Utc::now();
        Ok(patient.clone())
    }

    async fn delete_patient(&self, patient_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .patients
            .remove(&patient_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("patient {patient_id}")))
    }

    // --- Transfer Requests ---

    async fn create_transfer(&self, new_transfer: NewTransfer) -> PortResult<TransferRequest> {
        let mut state = self.state.lock().unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let transfer = TransferRequest {
            id,
            patient_id: new_transfer.patient_id,
            from_hospital: new_transfer.from_hospital,
            to_hospital: new_transfer.to_hospital,
            reason: new_transfer.reason,
            status: TransferStatus::Pending,
            notes: None,
            requested_by: new_transfer.requested_by,
            approved_by: None,
            created_at: now,
            updated_at: now,
        };
        state.transfers.insert(id, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&self, transfer_id: Uuid) -> PortResult<TransferWithPatient> {
        let state = self.state.lock().unwrap();
        let request = state
            .transfers
            .get(&transfer_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("transfer request {transfer_id}")))?;
        let patient = state
            .patients
            .get(&request.patient_id)
            .ok_or_else(|| PortError::NotFound("patient".into()))?;
        Ok(TransferWithPatient {
            patient_hospital_id: patient.hospital_id,
            patient_name: patient.full_name.clone(),
            request,
        })
    }

    async fn list_pending_transfers(&self) -> PortResult<Vec<PendingTransfer>> {
        let state = self.state.lock().unwrap();
        let user_ref = |id: Option<Uuid>| -> Option<UserRef> {
            let user = state.users.get(&id?)?;
            Some(UserRef {
                id: user.id,
                name: user.name.clone(),
                email: user.email.clone(),
            })
        };
        let mut pending: Vec<PendingTransfer> = state
            .transfers
            .values()
            .filter(|t| t.status == TransferStatus::Pending)
            .filter_map(|t| {
                let patient = state.patients.get(&t.patient_id)?;
                Some(PendingTransfer {
                    id: t.id,
                    patient: PatientRef {
                        id: patient.id,
                        full_name: patient.full_name.clone(),
                        national_id: patient.national_id.clone(),
                    },
                    requester: user_ref(t.requested_by),
                    approver: user_ref(t.approved_by),
                    from_hospital: t.from_hospital.clone(),
                    to_hospital: t.to_hospital.clone(),
                    reason: t.reason.clone(),
                    status: t.status,
                    notes: t.notes.clone(),
                    created_at: t.created_at,
                })
            })
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn resolve_transfer(
        &self,
        transfer_id: Uuid,
        outcome: TransferOutcome,
        resolved_by: Uuid,
        notes: &str,
    ) -> PortResult<TransferRequest> {
        // One lock makes the conditional transition and the patient side
        // effect a single atomic step.
        let mut state = self.state.lock().unwrap();
        let transfer = state
            .transfers
            .get_mut(&transfer_id)
            .ok_or_else(|| PortError::NotFound(format!("transfer request {transfer_id}")))?;
        if transfer.status != TransferStatus::Pending {
            return Err(PortError::AlreadyResolved);
        }
        transfer.status = outcome.terminal_status();
        transfer.approved_by = Some(resolved_by);
        transfer.notes = Some(notes.to_string());
        transfer.updated_at = Utc::now();
        let resolved = transfer.clone();

        if let Some(patient) = state.patients.get_mut(&resolved.patient_id) {
            patient.status = outcome.patient_status();
            if outcome == TransferOutcome::Approve {
                patient.transfer_to_other = true;
            }
            patient.updated_at = Utc::now();
        }
        Ok(resolved)
    }

    async fn list_transfers(&self) -> PortResult<Vec<TransferExportRow>> {
        let state = self.state.lock().unwrap();
        let user_name = |id: Option<Uuid>| id.and_then(|id| state.users.get(&id)).map(|u| u.name.clone());
        let mut rows: Vec<TransferExportRow> = state
            .transfers
            .values()
            .filter_map(|t| {
                let patient = state.patients.get(&t.patient_id)?;
                Some(TransferExportRow {
                    patient_name: patient.full_name.clone(),
                    national_id: patient.national_id.clone(),
                    from_hospital: t.from_hospital.clone(),
                    to_hospital: t.to_hospital.clone(),
                    reason: t.reason.clone(),
                    status: t.status,
                    requested_by: user_name(t.requested_by),
                    approved_by: user_name(t.approved_by),
                    created_at: t.created_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    // --- Analytics ---

    async fn kpi_counts(&self) -> PortResult<KpiCounts> {
        let state = self.state.lock().unwrap();
        Ok(KpiCounts {
            total_patients: state.patients.len() as i64,
            pending_transfers: state
                .transfers
                .values()
                .filter(|t| t.status == TransferStatus::Pending)
                .count() as i64,
            total_hospitals: state.hospitals.len() as i64,
            occupied_icu_beds: state
                .patients
                .values()
                .filter(|p| !p.transfer_to_other && p.status != PatientStatus::Discharged)
                .count() as i64,
            total_icu_beds: state.hospitals.values().map(|h| h.icu_beds as i64).sum(),
        })
    }

    async fn daily_patient_counts(&self, since: DateTime<Utc>) -> PortResult<Vec<DailyCount>> {
        let state = self.state.lock().unwrap();
        let mut by_day: HashMap<NaiveDate, i64> = HashMap::new();
        for patient in state.patients.values().filter(|p| p.created_at >= since) {
            *by_day.entry(patient.created_at.date_naive()).or_default() += 1;
        }
        let mut counts: Vec<DailyCount> = by_day
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect();
        counts.sort_by_key(|c| c.date);
        Ok(counts)
    }

    async fn patients_by_governorate(&self) -> PortResult<Vec<GroupCount>> {
        let state = self.state.lock().unwrap();
        let mut by_label: HashMap<String, i64> = HashMap::new();
        for patient in state.patients.values() {
            let label = patient
                .governorate
                .clone()
                .unwrap_or_else(|| "unspecified".to_string());
            *by_label.entry(label).or_default() += 1;
        }
        let mut counts: Vec<GroupCount> = by_label
            .into_iter()
            .map(|(label, count)| GroupCount { label, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(counts)
    }

    async fn transfers_by_hospital(&self) -> PortResult<Vec<GroupCount>> {
        let state = self.state.lock().unwrap();
        let mut by_label: HashMap<String, i64> = HashMap::new();
        for transfer in state.transfers.values() {
            *by_label.entry(transfer.from_hospital.clone()).or_default() += 1;
        }
        let mut counts: Vec<GroupCount> = by_label
            .into_iter()
            .map(|(label, count)| GroupCount { label, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(counts)
    }

    // --- Medical Services ---

    async fn list_services(&self) -> PortResult<Vec<MedicalService>> {
        let state = self.state.lock().unwrap();
        let mut all: Vec<MedicalService> = state.services.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn create_service(&self, new_service: NewService) -> PortResult<MedicalService> {
        let mut state = self.state.lock().unwrap();
        if state.services.values().any(|s| s.code == new_service.code) {
            return Err(PortError::Conflict("service code: duplicate value".into()));
        }
        let id = Uuid::new_v4();
        let service = MedicalService {
            id,
            name: new_service.name,
            code: new_service.code,
            kind: new_service.kind,
            description: new_service.description,
            is_active: true,
        };
        state.services.insert(id, service.clone());
        Ok(service)
    }

    async fn update_service(
        &self,
        service_id: Uuid,
        update: ServiceUpdate,
    ) -> PortResult<MedicalService> {
        let mut state = self.state.lock().unwrap();
        let service = state
            .services
            .get_mut(&service_id)
            .ok_or_else(|| PortError::NotFound(format!("service {service_id}")))?;
        if let Some(v) = update.name {
            service.name = v;
        }
        if let Some(v) = update.code {
            service.code = v;
        }
        if let Some(v) = update.kind {
            service.kind = v;
        }
        if let Some(v) = update.description {
            service.description = Some(v);
        }
        if let Some(v) = update.is_active {
            service.is_active = v;
        }
        Ok(service.clone())
    }

    async fn delete_service(&self, service_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .services
            .remove(&service_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("service {service_id}")))
    }

    async fn toggle_service_active(&self, service_id: Uuid) -> PortResult<MedicalService> {
        let mut state = self.state.lock().unwrap();
        let service = state
            .services
            .get_mut(&service_id)
            .ok_or_else(|| PortError::NotFound(format!("service {service_id}")))?;
        service.is_active = !service.is_active;
        Ok(service.clone())
    }

    // --- Treatment Protocols ---

    async fn list_protocols(&self) -> PortResult<Vec<Protocol>> {
        let state = self.state.lock().unwrap();
        let mut all: Vec<Protocol> = state.protocols.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn create_protocol(&self, new_protocol: NewProtocol) -> PortResult<Protocol> {
        let mut state = self.state.lock().unwrap();
        if state.protocols.values().any(|p| p.code == new_protocol.code) {
            return Err(PortError::Conflict("protocol code: duplicate value".into()));
        }
        let id = Uuid::new_v4();
        let protocol = Protocol {
            id,
            name: new_protocol.name,
            code: new_protocol.code,
            description: new_protocol.description,
            is_active: true,
        };
        state.protocols.insert(id, protocol.clone());
        Ok(protocol)
    }

    async fn update_protocol(
        &self,
        protocol_id: Uuid,
        update: ProtocolUpdate,
    ) -> PortResult<Protocol> {
        let mut state = self.state.lock().unwrap();
        let protocol = state
            .protocols
            .get_mut(&protocol_id)
            .ok_or_else(|| PortError::NotFound(format!("protocol {protocol_id}")))?;
        if let Some(v) = update.name {
            protocol.name = v;
        }
        if let Some(v) = update.code {
            protocol.code = v;
        }
        if let Some(v) = update.description {
            protocol.description = Some(v);
        }
        if let Some(v) = update.is_active {
            protocol.is_active = v;
        }
        Ok(protocol.clone())
    }

    async fn delete_protocol(&self, protocol_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .protocols
            .remove(&protocol_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("protocol {protocol_id}")))
    }

    async fn toggle_protocol_active(&self, protocol_id: Uuid) -> PortResult<Protocol> {
        let mut state = self.state.lock().unwrap();
        let protocol = state
            .protocols
            .get_mut(&protocol_id)
            .ok_or_else(|| PortError::NotFound(format!("protocol {protocol_id}")))?;
        protocol.is_active = !protocol.is_active;
        Ok(protocol.clone())
    }

    // --- Medical Standards ---

    async fn list_standards(&self) -> PortResult<Vec<MedicalStandard>> {
        let state = self.state.lock().unwrap();
        let mut all: Vec<MedicalStandard> = state.standards.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn create_standard(&self, new_standard: NewStandard) -> PortResult<MedicalStandard> {
        let mut state = self.state.lock().unwrap();
        let id = Uuid::new_v4();
        let standard = MedicalStandard {
            id,
            name: new_standard.name,
            category: new_standard.category,
            description: new_standard.description,
            criteria: new_standard.criteria,
            is_active: true,
        };
        state.standards.insert(id, standard.clone());
        Ok(standard)
    }

    async fn update_standard(
        &self,
        standard_id: Uuid,
        update: StandardUpdate,
    ) -> PortResult<MedicalStandard> {
        let mut state = self.state.lock().unwrap();
        let standard = state
            .standards
            .get_mut(&standard_id)
            .ok_or_else(|| PortError::NotFound(format!("standard {standard_id}")))?;
        if let Some(v) = update.name {
            standard.name = v;
        }
        if let Some(v) = update.category {
            standard.category = v;
        }
        if let Some(v) = update.description {
            standard.description = Some(v);
        }
        if let Some(v) = update.criteria {
            standard.criteria = v;
        }
        if let Some(v) = update.is_active {
            standard.is_active = v;
        }
        Ok(standard.clone())
    }

    async fn delete_standard(&self, standard_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .standards
            .remove(&standard_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("standard {standard_id}")))
    }

    async fn toggle_standard_active(&self, standard_id: Uuid) -> PortResult<MedicalStandard> {
        let mut state = self.state.lock().unwrap();
        let standard = state
            .standards
            .get_mut(&standard_id)
            .ok_or_else(|| PortError::NotFound(format!("standard {standard_id}")))?;
        standard.is_active = !standard.is_active;
        Ok(standard.clone())
    }
}

//=========================================================================================
// App and Request Helpers
//=========================================================================================

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        client_origin: "http://localhost:3000".to_string(),
        session_ttl_hours: 24,
        cookie_secure: false,
        seed_admin_email: "admin@hospital.com".to_string(),
        seed_admin_password: "Admin123!".to_string(),
    }
}

/// Builds the shared application state over the in-memory database, for
/// tests that call a handler directly.
pub fn test_state() -> (Arc<AppState>, Arc<MockDb>) {
    let db = MockDb::new();
    let state = Arc::new(AppState {
        db: db.clone(),
        config: Arc::new(test_config()),
    });
    (state, db)
}

/// Builds the real router over the in-memory database.
pub fn test_app() -> (Router, Arc<MockDb>) {
    let (state, db) = test_state();
    (build_router(state), db)
}

pub async fn send(
    app: &Router,
    method: &str,
    path: &str,
    cookie: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("session={token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

/// Sends a multipart/form-data request with a single `file` part holding
/// `content` (e.g. a CSV payload).
pub async fn send_multipart(
    app: &Router,
    path: &str,
    cookie: Option<&str>,
    filename: &str,
    content: &str,
) -> Response<Body> {
    let boundary = "----hospital-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n\
         --{boundary}--\r\n"
    );
    let mut builder = Request::builder().method("POST").uri(path).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={boundary}"),
    );
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("session={token}"));
    }
    let request = builder.body(Body::from(body)).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Asserts the status and returns the parsed JSON body.
pub async fn expect_status(
    response: Response<Body>,
    expected: StatusCode,
) -> serde_json::Value {
    let status = response.status();
    let body = body_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {body}");
    body
}

/// Shorthand fixtures used by both test binaries.
pub struct TwoHospitals {
    pub hospital_a: Uuid,
    pub hospital_b: Uuid,
    pub admin_a: Uuid,
    pub admin_b: Uuid,
    pub doctor_a: Uuid,
    pub system_admin: Uuid,
}

pub fn seed_two_hospitals(db: &MockDb) -> TwoHospitals {
    let hospital_a = db.insert_hospital("Alpha General", "ALPHA");
    let hospital_b = db.insert_hospital("Beta Central", "BETA");
    TwoHospitals {
        hospital_a,
        hospital_b,
        admin_a: db.insert_user(
            "admin.a@hospital.example",
            "password-a",
            &[HOSPITAL_ADMIN],
            Some(hospital_a),
            true,
        ),
        admin_b: db.insert_user(
            "admin.b@hospital.example",
            "password-b",
            &[HOSPITAL_ADMIN],
            Some(hospital_b),
            true,
        ),
        doctor_a: db.insert_user(
            "doctor.a@hospital.example",
            "password-d",
            &[DOCTOR],
            Some(hospital_a),
            true,
        ),
        system_admin: db.insert_user(
            "root@hospital.example",
            "password-root",
            &[SYSTEM_ADMIN],
            None,
            true,
        ),
    }
}
