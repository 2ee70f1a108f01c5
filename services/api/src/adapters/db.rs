//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use hospital_core::domain::{
    AuthSession, Gender, Governorate, Hospital, MedicalService, MedicalStandard, Patient,
    PatientStatus, PermissionSet, Protocol, Role, User,
};
use hospital_core::ports::{
    DailyCount, DatabaseService, GroupCount, HospitalFilter, HospitalPage, HospitalUpdate,
    KpiCounts, NewHospital, NewPatient, NewProtocol, NewRole, NewService, NewStandard,
    NewTransfer, NewUser, PatientRef, PatientUpdate, PendingTransfer, PortError, PortResult,
    ProtocolUpdate, ServiceUpdate, StandardUpdate, TransferExportRow, TransferWithPatient,
    UserRef, UserUpdate,
};
use hospital_core::transfer::{TransferOutcome, TransferRequest, TransferStatus};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct PgAdapter {
    pool: PgPool,
}

impl PgAdapter {
    /// Creates a new `PgAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Classifies an `sqlx` error into the port taxonomy. Uniqueness and
/// foreign-key violations become `Conflict`; everything else that is not a
/// missing row is opaque to callers.
fn port_err(context: &str, e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(context.to_string()),
        sqlx::Error::Database(db) => match db.kind() {
            sqlx::error::ErrorKind::UniqueViolation => {
                PortError::Conflict(format!("{context}: duplicate value"))
            }
            sqlx::error::ErrorKind::ForeignKeyViolation => {
                PortError::Conflict(format!("{context}: referenced by other records"))
            }
            _ => PortError::Unexpected(e.to_string()),
        },
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    roles: Vec<String>,
    active_role: String,
    hospital_id: Option<Uuid>,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            roles: self.roles,
            active_role: self.active_role,
            hospital_id: self.hospital_id,
            is_active: self.is_active,
            last_login: self.last_login,
        }
    }
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, roles, active_role, hospital_id, is_active, last_login";

#[derive(FromRow)]
struct SessionRecord {
    token: String,
    user_id: Uuid,
    role: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            token: self.token,
            user_id: self.user_id,
            role: self.role,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct RoleRecord {
    id: Uuid,
    name: String,
    display_name: String,
    description: String,
    permissions: serde_json::Value,
}

impl RoleRecord {
    fn to_domain(self) -> PortResult<Role> {
        let permissions: PermissionSet = serde_json::from_value(self.permissions)
            .map_err(|e| PortError::Unexpected(format!("stored permissions invalid: {e}")))?;
        Ok(Role {
            id: self.id,
            name: self.name,
            display_name: self.display_name,
            description: self.description,
            permissions,
        })
    }
}

#[derive(FromRow)]
struct GovernorateRecord {
    id: Uuid,
    name: String,
    code: String,
}

impl GovernorateRecord {
    fn to_domain(self) -> Governorate {
        Governorate {
            id: self.id,
            name: self.name,
            code: self.code,
        }
    }
}

#[derive(FromRow)]
struct HospitalRecord {
    id: Uuid,
    code: String,
    name: String,
    governorate_id: Option<Uuid>,
    governorate_name: Option<String>,
    icu_beds: i32,
    pediatric_beds: i32,
    incubators: i32,
    newborn_beds: i32,
    medium_care_beds: i32,
}

impl HospitalRecord {
    fn to_domain(self) -> Hospital {
        Hospital {
            id: self.id,
            code: self.code,
            name: self.name,
            governorate_id: self.governorate_id,
            governorate_name: self.governorate_name,
            icu_beds: self.icu_beds,
            pediatric_beds: self.pediatric_beds,
            incubators: self.incubators,
            newborn_beds: self.newborn_beds,
            medium_care_beds: self.medium_care_beds,
        }
    }
}

const HOSPITAL_SELECT: &str = "SELECT h.id, h.code, h.name, h.governorate_id, g.name AS governorate_name, \
     h.icu_beds, h.pediatric_beds, h.incubators, h.newborn_beds, h.medium_care_beds \
     FROM hospitals h LEFT JOIN governorates g ON g.id = h.governorate_id";

#[derive(FromRow)]
struct PatientRecord {
    id: Uuid,
    report_number: Option<String>,
    full_name: String,
    national_id: String,
    gender: Option<String>,
    governorate: Option<String>,
    phone: Option<String>,
    referral_source: Option<String>,
    admission_date: Option<NaiveDate>,
    initial_diagnosis: Option<String>,
    status: String,
    transfer_to_other: bool,
    direct_transfer: bool,
    discharge_status: Option<String>,
    discharge_date: Option<NaiveDate>,
    hospital_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PatientRecord {
    fn to_domain(self) -> PortResult<Patient> {
        let status = PatientStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("stored patient status '{}' invalid", self.status))
        })?;
        let gender = match self.gender.as_deref() {
            Some("male") => Some(Gender::Male),
            Some("female") => Some(Gender::Female),
            _ => None,
        };
        Ok(Patient {
            id: self.id,
            report_number: self.report_number,
            full_name: self.full_name,
            national_id: self.national_id,
            gender,
            governorate: self.governorate,
            phone: self.phone,
            referral_source: self.referral_source,
            admission_date: self.admission_date,
            initial_diagnosis: self.initial_diagnosis,
            status,
            transfer_to_other: self.transfer_to_other,
            direct_transfer: self.direct_transfer,
            discharge_status: self.discharge_status,
            discharge_date: self.discharge_date,
            hospital_id: self.hospital_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PATIENT_COLUMNS: &str = "id, report_number, full_name, national_id, gender, governorate, \
     phone, referral_source, admission_date, initial_diagnosis, status, transfer_to_other, \
     direct_transfer, discharge_status, discharge_date, hospital_id, created_at, updated_at";

#[derive(FromRow)]
struct TransferRecord {
    id: Uuid,
    patient_id: Uuid,
    from_hospital: String,
    to_hospital: String,
    reason: String,
    status: String,
    notes: Option<String>,
    requested_by: Option<Uuid>,
    approved_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransferRecord {
    fn to_domain(self) -> PortResult<TransferRequest> {
        let status = TransferStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("stored transfer status '{}' invalid", self.status))
        })?;
        Ok(TransferRequest {
            id: self.id,
            patient_id: self.patient_id,
            from_hospital: self.from_hospital,
            to_hospital: self.to_hospital,
            reason: self.reason,
            status,
            notes: self.notes,
            requested_by: self.requested_by,
            approved_by: self.approved_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const TRANSFER_COLUMNS: &str = "id, patient_id, from_hospital, to_hospital, reason, status, \
     notes, requested_by, approved_by, created_at, updated_at";

#[derive(FromRow)]
struct PendingTransferRow {
    id: Uuid,
    from_hospital: String,
    to_hospital: String,
    reason: String,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    patient_id: Uuid,
    patient_name: String,
    patient_national_id: String,
    requester_id: Option<Uuid>,
    requester_name: Option<String>,
    requester_email: Option<String>,
    approver_id: Option<Uuid>,
    approver_name: Option<String>,
    approver_email: Option<String>,
}

impl PendingTransferRow {
    fn to_domain(self) -> PortResult<PendingTransfer> {
        let status = TransferStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("stored transfer status '{}' invalid", self.status))
        })?;
        let requester = match (self.requester_id, self.requester_name, self.requester_email) {
            (Some(id), Some(name), Some(email)) => Some(UserRef { id, name, email }),
            _ => None,
        };
        let approver = match (self.approver_id, self.approver_name, self.approver_email) {
            (Some(id), Some(name), Some(email)) => Some(UserRef { id, name, email }),
            _ => None,
        };
        Ok(PendingTransfer {
            id: self.id,
            patient: PatientRef {
                id: self.patient_id,
                full_name: self.patient_name,
                national_id: self.patient_national_id,
            },
            requester,
            approver,
            from_hospital: self.from_hospital,
            to_hospital: self.to_hospital,
            reason: self.reason,
            status,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ServiceRecord {
    id: Uuid,
    name: String,
    code: String,
    kind: String,
    description: Option<String>,
    is_active: bool,
}

impl ServiceRecord {
    fn to_domain(self) -> MedicalService {
        MedicalService {
            id: self.id,
            name: self.name,
            code: self.code,
            kind: self.kind,
            description: self.description,
            is_active: self.is_active,
        }
    }
}

#[derive(FromRow)]
struct ProtocolRecord {
    id: Uuid,
    name: String,
    code: String,
    description: Option<String>,
    is_active: bool,
}

impl ProtocolRecord {
    fn to_domain(self) -> Protocol {
        Protocol {
            id: self.id,
            name: self.name,
            code: self.code,
            description: self.description,
            is_active: self.is_active,
        }
    }
}

#[derive(FromRow)]
struct StandardRecord {
    id: Uuid,
    name: String,
    category: String,
    description: Option<String>,
    criteria: String,
    is_active: bool,
}

impl StandardRecord {
    fn to_domain(self) -> MedicalStandard {
        MedicalStandard {
            id: self.id,
            name: self.name,
            category: self.category,
            description: self.description,
            criteria: self.criteria,
            is_active: self.is_active,
        }
    }
}

/// Appends the WHERE clause for the hospital list filters.
fn push_hospital_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &HospitalFilter) {
    let mut first = true;
    let mut sep = |qb: &mut QueryBuilder<'_, Postgres>| {
        if first {
            qb.push(" WHERE ");
            first = false;
        } else {
            qb.push(" AND ");
        }
    };

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        sep(qb);
        qb.push("(h.code ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR h.name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR g.name ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
    if let Some(gov) = filter.governorate.as_deref().filter(|s| !s.is_empty()) {
        sep(qb);
        qb.push("g.name = ");
        qb.push_bind(gov.to_string());
    }
    let beds = [
        ("h.icu_beds", filter.min_icu_beds),
        ("h.pediatric_beds", filter.min_pediatric_beds),
        ("h.incubators", filter.min_incubators),
        ("h.newborn_beds", filter.min_newborn_beds),
        ("h.medium_care_beds", filter.min_medium_care_beds),
    ];
    for (column, min) in beds {
        if let Some(min) = min {
            sep(qb);
            qb.push(column);
            qb.push(" >= ");
            qb.push_bind(min);
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for PgAdapter {
    // --- Users ---

    async fn get_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("user {user_id}"), e))?;
        Ok(record.to_domain())
    }

    async fn list_users(&self, hospital_scope: Option<Uuid>) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::uuid IS NULL OR hospital_id = $1) ORDER BY name ASC"
        ))
        .bind(hospital_scope)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(UserRecord::to_domain).collect())
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, name, email, password_hash, roles, active_role, hospital_id, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.roles)
        .bind(&new_user.active_role)
        .bind(new_user.hospital_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("user email", e))?;
        Ok(record.to_domain())
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET name = $1, email = $2, roles = $3, active_role = $4, \
             hospital_id = $5, is_active = $6, updated_at = NOW() \
             WHERE id = $7 RETURNING {USER_COLUMNS}"
        ))
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.roles)
        .bind(&update.active_role)
        .bind(update.hospital_id)
        .bind(update.is_active)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("user {user_id}"), e))?;
        Ok(record.to_domain())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| port_err(&format!("user {user_id}"), e))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn toggle_user_active(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET is_active = NOT is_active, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("user {user_id}"), e))?;
        Ok(record.to_domain())
    }

    async fn record_login(
        &self,
        user_id: Uuid,
        active_role: &str,
        at: DateTime<Utc>,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET last_login = $1, active_role = $2, updated_at = NOW() \
             WHERE id = $3 RETURNING {USER_COLUMNS}"
        ))
        .bind(at)
        .bind(active_role)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("user {user_id}"), e))?;
        Ok(record.to_domain())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn find_user_with_role(&self, role: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE $1 = ANY(roles) LIMIT 1"
        ))
        .bind(role)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        token: &str,
        user_id: Uuid,
        role: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO auth_sessions (token, user_id, role, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(token)
        .bind(user_id)
        .bind(role)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_auth_session(&self, token: &str) -> PortResult<Option<AuthSession>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT token, user_id, role, created_at, expires_at FROM auth_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SessionRecord::to_domain))
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    // --- Roles ---

    async fn list_roles(&self) -> PortResult<Vec<Role>> {
        let records = sqlx::query_as::<_, RoleRecord>(
            "SELECT id, name, display_name, description, permissions FROM roles ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(RoleRecord::to_domain).collect()
    }

    async fn create_role(&self, new_role: NewRole) -> PortResult<Role> {
        let permissions = serde_json::to_value(&new_role.permissions)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let record = sqlx::query_as::<_, RoleRecord>(
            "INSERT INTO roles (id, name, display_name, description, permissions) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, name, display_name, description, permissions",
        )
        .bind(Uuid::new_v4())
        .bind(&new_role.name)
        .bind(&new_role.display_name)
        .bind(&new_role.description)
        .bind(permissions)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("role name", e))?;
        record.to_domain()
    }

    async fn update_role(&self, role_id: Uuid, update: NewRole) -> PortResult<Role> {
        let permissions = serde_json::to_value(&update.permissions)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let record = sqlx::query_as::<_, RoleRecord>(
            "UPDATE roles SET name = $1, display_name = $2, description = $3, permissions = $4 \
             WHERE id = $5 RETURNING id, name, display_name, description, permissions",
        )
        .bind(&update.name)
        .bind(&update.display_name)
        .bind(&update.description)
        .bind(permissions)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("role {role_id}"), e))?;
        record.to_domain()
    }

    async fn delete_role(&self, role_id: Uuid) -> PortResult<()> {
        let name: Option<(String,)> =
            sqlx::query_as("SELECT name FROM roles WHERE id = $1")
                .bind(role_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
        let (name,) = name.ok_or_else(|| PortError::NotFound(format!("role {role_id}")))?;

        let (referencing,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE $1 = ANY(roles)")
                .bind(&name)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;
        if referencing > 0 {
            return Err(PortError::Conflict(format!(
                "role '{name}' is still assigned to {referencing} user(s)"
            )));
        }

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Governorates ---

    async fn list_governorates(&self) -> PortResult<Vec<Governorate>> {
        let records = sqlx::query_as::<_, GovernorateRecord>(
            "SELECT id, name, code FROM governorates ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(GovernorateRecord::to_domain).collect())
    }

    async fn create_governorate(&self, name: &str, code: &str) -> PortResult<Governorate> {
        let record = sqlx::query_as::<_, GovernorateRecord>(
            "INSERT INTO governorates (id, name, code) VALUES ($1, $2, $3) RETURNING id, name, code",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("governorate name/code", e))?;
        Ok(record.to_domain())
    }

    async fn update_governorate(
        &self,
        governorate_id: Uuid,
        name: Option<&str>,
        code: Option<&str>,
    ) -> PortResult<Governorate> {
        let record = sqlx::query_as::<_, GovernorateRecord>(
            "UPDATE governorates SET name = COALESCE($1, name), code = COALESCE($2, code) \
             WHERE id = $3 RETURNING id, name, code",
        )
        .bind(name)
        .bind(code)
        .bind(governorate_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("governorate {governorate_id}"), e))?;
        Ok(record.to_domain())
    }

    async fn delete_governorate(&self, governorate_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM governorates WHERE id = $1")
            .bind(governorate_id)
            .execute(&self.pool)
            .await
            .map_err(|e| port_err(&format!("governorate {governorate_id}"), e))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "governorate {governorate_id}"
            )));
        }
        Ok(())
    }

    async fn upsert_governorate(&self, name: &str, code: &str) -> PortResult<Governorate> {
        let record = sqlx::query_as::<_, GovernorateRecord>(
            "INSERT INTO governorates (id, name, code) VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO UPDATE SET code = EXCLUDED.code \
             RETURNING id, name, code",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("governorate code", e))?;
        Ok(record.to_domain())
    }

    // --- Hospitals ---

    async fn list_hospitals(&self, filter: HospitalFilter) -> PortResult<HospitalPage> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 1000);
        let offset = (page - 1) * limit;

        let mut list_query = QueryBuilder::<Postgres>::new(HOSPITAL_SELECT);
        push_hospital_filters(&mut list_query, &filter);
        list_query.push(" ORDER BY h.name ASC LIMIT ");
        list_query.push_bind(limit);
        list_query.push(" OFFSET ");
        list_query.push_bind(offset);
        let records: Vec<HospitalRecord> = list_query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut count_query = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM hospitals h LEFT JOIN governorates g ON g.id = h.governorate_id",
        );
        push_hospital_filters(&mut count_query, &filter);
        let total_filtered: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let (total_all,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM hospitals")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(HospitalPage {
            data: records.into_iter().map(HospitalRecord::to_domain).collect(),
            total_filtered,
            total_all,
            page,
            total_pages: (total_filtered + limit - 1) / limit,
        })
    }

    async fn get_hospital(&self, hospital_id: Uuid) -> PortResult<Hospital> {
        let record = sqlx::query_as::<_, HospitalRecord>(&format!(
            "{HOSPITAL_SELECT} WHERE h.id = $1"
        ))
        .bind(hospital_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("hospital {hospital_id}"), e))?;
        Ok(record.to_domain())
    }

    async fn get_hospital_by_code(&self, code: &str) -> PortResult<Option<Hospital>> {
        let record = sqlx::query_as::<_, HospitalRecord>(&format!(
            "{HOSPITAL_SELECT} WHERE h.code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(HospitalRecord::to_domain))
    }

    async fn create_hospital(&self, new_hospital: NewHospital) -> PortResult<Hospital> {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO hospitals (id, code, name, governorate_id, icu_beds, pediatric_beds, \
             incubators, newborn_beds, medium_care_beds) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&new_hospital.code)
        .bind(&new_hospital.name)
        .bind(new_hospital.governorate_id)
        .bind(new_hospital.icu_beds)
        .bind(new_hospital.pediatric_beds)
        .bind(new_hospital.incubators)
        .bind(new_hospital.newborn_beds)
        .bind(new_hospital.medium_care_beds)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("hospital code", e))?;
        self.get_hospital(id).await
    }

    async fn update_hospital(
        &self,
        hospital_id: Uuid,
        update: HospitalUpdate,
    ) -> PortResult<Hospital> {
        let (id,): (Uuid,) = sqlx::query_as(
            "UPDATE hospitals SET code = COALESCE($1, code), name = COALESCE($2, name), \
             governorate_id = COALESCE($3, governorate_id), \
             icu_beds = COALESCE($4, icu_beds), pediatric_beds = COALESCE($5, pediatric_beds), \
             incubators = COALESCE($6, incubators), newborn_beds = COALESCE($7, newborn_beds), \
             medium_care_beds = COALESCE($8, medium_care_beds) \
             WHERE id = $9 RETURNING id",
        )
        .bind(update.code)
        .bind(update.name)
        .bind(update.governorate_id)
        .bind(update.icu_beds)
        .bind(update.pediatric_beds)
        .bind(update.incubators)
        .bind(update.newborn_beds)
        .bind(update.medium_care_beds)
        .bind(hospital_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("hospital {hospital_id}"), e))?;
        self.get_hospital(id).await
    }

    async fn delete_hospital(&self, hospital_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM hospitals WHERE id = $1")
            .bind(hospital_id)
            .execute(&self.pool)
            .await
            .map_err(|e| port_err(&format!("hospital {hospital_id}"), e))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("hospital {hospital_id}")));
        }
        Ok(())
    }

    async fn upsert_hospital(&self, new_hospital: NewHospital) -> PortResult<Hospital> {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO hospitals (id, code, name, governorate_id, icu_beds, pediatric_beds, \
             incubators, newborn_beds, medium_care_beds) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name, \
             governorate_id = COALESCE(EXCLUDED.governorate_id, hospitals.governorate_id), \
             icu_beds = EXCLUDED.icu_beds, pediatric_beds = EXCLUDED.pediatric_beds, \
             incubators = EXCLUDED.incubators, newborn_beds = EXCLUDED.newborn_beds, \
             medium_care_beds = EXCLUDED.medium_care_beds \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&new_hospital.code)
        .bind(&new_hospital.name)
        .bind(new_hospital.governorate_id)
        .bind(new_hospital.icu_beds)
        .bind(new_hospital.pediatric_beds)
        .bind(new_hospital.incubators)
        .bind(new_hospital.newborn_beds)
        .bind(new_hospital.medium_care_beds)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        self.get_hospital(id).await
    }

    // --- Patients ---

    async fn list_patients(&self, hospital_scope: Option<Uuid>) -> PortResult<Vec<Patient>> {
        let records = sqlx::query_as::<_, PatientRecord>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients \
             WHERE ($1::uuid IS NULL OR hospital_id = $1) ORDER BY created_at DESC"
        ))
        .bind(hospital_scope)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(PatientRecord::to_domain).collect()
    }

    async fn get_patient(&self, patient_id: Uuid) -> PortResult<Patient> {
        let record = sqlx::query_as::<_, PatientRecord>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"
        ))
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("patient {patient_id}"), e))?;
        record.to_domain()
    }

    async fn create_patient(&self, new_patient: NewPatient) -> PortResult<Patient> {
        let record = sqlx::query_as::<_, PatientRecord>(&format!(
            "INSERT INTO patients (id, report_number, full_name, national_id, gender, governorate, \
             phone, referral_source, admission_date, initial_diagnosis, status, direct_transfer, hospital_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'admitted', $11, $12) \
             RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new_patient.report_number)
        .bind(&new_patient.full_name)
        .bind(&new_patient.national_id)
        .bind(new_patient.gender.map(|g| g.as_str()))
        .bind(&new_patient.governorate)
        .bind(&new_patient.phone)
        .bind(&new_patient.referral_source)
        .bind(new_patient.admission_date)
        .bind(&new_patient.initial_diagnosis)
        .bind(new_patient.direct_transfer)
        .bind(new_patient.hospital_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("patient national id", e))?;
        record.to_domain()
    }

    async fn update_patient(
        &self,
        patient_id: Uuid,
        update: PatientUpdate,
    ) -> PortResult<Patient> {
        let record = sqlx::query_as::<_, PatientRecord>(&format!(
            "UPDATE patients SET full_name = COALESCE($1, full_name), \
             phone = COALESCE($2, phone), governorate = COALESCE($3, governorate), \
             referral_source = COALESCE($4, referral_source), \
             initial_diagnosis = COALESCE($5, initial_diagnosis), \
             status = COALESCE($6, status), \
             discharge_status = COALESCE($7, discharge_status), \
             discharge_date = COALESCE($8, discharge_date), \
             hospital_id = COALESCE($9, hospital_id), updated_at = NOW() \
             WHERE id = $10 RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(update.full_name)
        .bind(update.phone)
        .bind(update.governorate)
        .bind(update.referral_source)
        .bind(update.initial_diagnosis)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.discharge_status)
        .bind(update.discharge_date)
        .bind(update.hospital_id)
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("patient {patient_id}"), e))?;
        record.to_domain()
    }

    async fn delete_patient(&self, patient_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(patient_id)
            .execute(&self.pool)
            .await
            .map_err(|e| port_err(&format!("patient {patient_id}"), e))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("patient {patient_id}")));
        }
        Ok(())
    }

    // --- Transfer Requests ---

    async fn create_transfer(&self, new_transfer: NewTransfer) -> PortResult<TransferRequest> {
        let record = sqlx::query_as::<_, TransferRecord>(&format!(
            "INSERT INTO transfer_requests (id, patient_id, from_hospital, to_hospital, reason, \
             status, requested_by) VALUES ($1, $2, $3, $4, $5, 'pending', $6) \
             RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new_transfer.patient_id)
        .bind(&new_transfer.from_hospital)
        .bind(&new_transfer.to_hospital)
        .bind(&new_transfer.reason)
        .bind(new_transfer.requested_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("transfer request", e))?;
        record.to_domain()
    }

    async fn get_transfer(&self, transfer_id: Uuid) -> PortResult<TransferWithPatient> {
        #[derive(FromRow)]
        struct Row {
            #[sqlx(flatten)]
            transfer: TransferRecord,
            patient_hospital_id: Uuid,
            patient_name: String,
        }

        let row = sqlx::query_as::<_, Row>(
            "SELECT t.id, t.patient_id, t.from_hospital, t.to_hospital, t.reason, t.status, \
             t.notes, t.requested_by, t.approved_by, t.created_at, t.updated_at, \
             p.hospital_id AS patient_hospital_id, p.full_name AS patient_name \
             FROM transfer_requests t JOIN patients p ON p.id = t.patient_id WHERE t.id = $1",
        )
        .bind(transfer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("transfer request {transfer_id}"), e))?;

        Ok(TransferWithPatient {
            request: row.transfer.to_domain()?,
            patient_hospital_id: row.patient_hospital_id,
            patient_name: row.patient_name,
        })
    }

    async fn list_pending_transfers(&self) -> PortResult<Vec<PendingTransfer>> {
        let rows = sqlx::query_as::<_, PendingTransferRow>(
            "SELECT t.id, t.from_hospital, t.to_hospital, t.reason, t.status, t.notes, t.created_at, \
             p.id AS patient_id, p.full_name AS patient_name, p.national_id AS patient_national_id, \
             r.id AS requester_id, r.name AS requester_name, r.email AS requester_email, \
             a.id AS approver_id, a.name AS approver_name, a.email AS approver_email \
             FROM transfer_requests t \
             JOIN patients p ON p.id = t.patient_id \
             LEFT JOIN users r ON r.id = t.requested_by \
             LEFT JOIN users a ON a.id = t.approved_by \
             WHERE t.status = 'pending' ORDER BY t.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        rows.into_iter().map(PendingTransferRow::to_domain).collect()
    }

    async fn resolve_transfer(
        &self,
        transfer_id: Uuid,
        outcome: TransferOutcome,
        resolved_by: Uuid,
        notes: &str,
    ) -> PortResult<TransferRequest> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The conditional update is the idempotence guard: a request that is
        // no longer pending matches zero rows.
        let updated = sqlx::query_as::<_, TransferRecord>(&format!(
            "UPDATE transfer_requests SET status = $1, approved_by = $2, notes = $3, \
             updated_at = NOW() WHERE id = $4 AND status = 'pending' \
             RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(outcome.terminal_status().as_str())
        .bind(resolved_by)
        .bind(notes)
        .bind(transfer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let record = match updated {
            Some(record) => record,
            None => {
                let exists: Option<(Uuid,)> =
                    sqlx::query_as("SELECT id FROM transfer_requests WHERE id = $1")
                        .bind(transfer_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(unexpected)?;
                tx.rollback().await.ok();
                return Err(match exists {
                    Some(_) => PortError::AlreadyResolved,
                    None => PortError::NotFound(format!("transfer request {transfer_id}")),
                });
            }
        };

        // The patient side effect commits or rolls back with the request.
        sqlx::query(
            "UPDATE patients SET status = $1, \
             transfer_to_other = (transfer_to_other OR $2), updated_at = NOW() WHERE id = $3",
        )
        .bind(outcome.patient_status().as_str())
        .bind(matches!(outcome, TransferOutcome::Approve))
        .bind(record.patient_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_transfers(&self) -> PortResult<Vec<TransferExportRow>> {
        #[derive(FromRow)]
        struct Row {
            patient_name: String,
            national_id: String,
            from_hospital: String,
            to_hospital: String,
            reason: String,
            status: String,
            requested_by: Option<String>,
            approved_by: Option<String>,
            created_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT p.full_name AS patient_name, p.national_id, t.from_hospital, t.to_hospital, \
             t.reason, t.status, r.name AS requested_by, a.name AS approved_by, t.created_at \
             FROM transfer_requests t \
             JOIN patients p ON p.id = t.patient_id \
             LEFT JOIN users r ON r.id = t.requested_by \
             LEFT JOIN users a ON a.id = t.approved_by \
             ORDER BY t.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter()
            .map(|row| {
                let status = TransferStatus::parse(&row.status).ok_or_else(|| {
                    PortError::Unexpected(format!("stored transfer status '{}' invalid", row.status))
                })?;
                Ok(TransferExportRow {
                    patient_name: row.patient_name,
                    national_id: row.national_id,
                    from_hospital: row.from_hospital,
                    to_hospital: row.to_hospital,
                    reason: row.reason,
                    status,
                    requested_by: row.requested_by,
                    approved_by: row.approved_by,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    // --- Analytics ---

    async fn kpi_counts(&self) -> PortResult<KpiCounts> {
        let (total_patients, pending_transfers, total_hospitals, occupied_icu_beds, total_icu_beds): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT \
                 (SELECT COUNT(*) FROM patients), \
                 (SELECT COUNT(*) FROM transfer_requests WHERE status = 'pending'), \
                 (SELECT COUNT(*) FROM hospitals), \
                 (SELECT COUNT(*) FROM patients WHERE transfer_to_other = FALSE AND status <> 'discharged'), \
                 (SELECT COALESCE(SUM(icu_beds), 0) FROM hospitals)",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(KpiCounts {
            total_patients,
            pending_transfers,
            total_hospitals,
            occupied_icu_beds,
            total_icu_beds,
        })
    }

    async fn daily_patient_counts(&self, since: DateTime<Utc>) -> PortResult<Vec<DailyCount>> {
        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
            "SELECT created_at::date AS day, COUNT(*) FROM patients \
             WHERE created_at >= $1 GROUP BY day ORDER BY day ASC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect())
    }

    async fn patients_by_governorate(&self) -> PortResult<Vec<GroupCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT COALESCE(governorate, 'unspecified') AS label, COUNT(*) FROM patients \
             GROUP BY label ORDER BY COUNT(*) DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|(label, count)| GroupCount { label, count })
            .collect())
    }

    async fn transfers_by_hospital(&self) -> PortResult<Vec<GroupCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT from_hospital AS label, COUNT(*) FROM transfer_requests \
             GROUP BY from_hospital ORDER BY COUNT(*) DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|(label, count)| GroupCount { label, count })
            .collect())
    }

    // --- Medical Services ---

    async fn list_services(&self) -> PortResult<Vec<MedicalService>> {
        let records = sqlx::query_as::<_, ServiceRecord>(
            "SELECT id, name, code, kind, description, is_active FROM services ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ServiceRecord::to_domain).collect())
    }

    async fn create_service(&self, new_service: NewService) -> PortResult<MedicalService> {
        let record = sqlx::query_as::<_, ServiceRecord>(
            "INSERT INTO services (id, name, code, kind, description, is_active) \
             VALUES ($1, $2, $3, $4, $5, TRUE) \
             RETURNING id, name, code, kind, description, is_active",
        )
        .bind(Uuid::new_v4())
        .bind(&new_service.name)
        .bind(&new_service.code)
        .bind(&new_service.kind)
        .bind(&new_service.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("service code", e))?;
        Ok(record.to_domain())
    }

    async fn update_service(
        &self,
        service_id: Uuid,
        update: ServiceUpdate,
    ) -> PortResult<MedicalService> {
        let record = sqlx::query_as::<_, ServiceRecord>(
            "UPDATE services SET name = COALESCE($1, name), code = COALESCE($2, code), \
             kind = COALESCE($3, kind), description = COALESCE($4, description), \
             is_active = COALESCE($5, is_active) \
             WHERE id = $6 RETURNING id, name, code, kind, description, is_active",
        )
        .bind(update.name)
        .bind(update.code)
        .bind(update.kind)
        .bind(update.description)
        .bind(update.is_active)
        .bind(service_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("service {service_id}"), e))?;
        Ok(record.to_domain())
    }

    async fn delete_service(&self, service_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(service_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("service {service_id}")));
        }
        Ok(())
    }

    async fn toggle_service_active(&self, service_id: Uuid) -> PortResult<MedicalService> {
        let record = sqlx::query_as::<_, ServiceRecord>(
            "UPDATE services SET is_active = NOT is_active \
             WHERE id = $1 RETURNING id, name, code, kind, description, is_active",
        )
        .bind(service_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("service {service_id}"), e))?;
        Ok(record.to_domain())
    }

    // --- Treatment Protocols ---

    async fn list_protocols(&self) -> PortResult<Vec<Protocol>> {
        let records = sqlx::query_as::<_, ProtocolRecord>(
            "SELECT id, name, code, description, is_active FROM protocols ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ProtocolRecord::to_domain).collect())
    }

    async fn create_protocol(&self, new_protocol: NewProtocol) -> PortResult<Protocol> {
        let record = sqlx::query_as::<_, ProtocolRecord>(
            "INSERT INTO protocols (id, name, code, description, is_active) \
             VALUES ($1, $2, $3, $4, TRUE) \
             RETURNING id, name, code, description, is_active",
        )
        .bind(Uuid::new_v4())
        .bind(&new_protocol.name)
        .bind(&new_protocol.code)
        .bind(&new_protocol.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("protocol code", e))?;
        Ok(record.to_domain())
    }

    async fn update_protocol(
        &self,
        protocol_id: Uuid,
        update: ProtocolUpdate,
    ) -> PortResult<Protocol> {
        let record = sqlx::query_as::<_, ProtocolRecord>(
            "UPDATE protocols SET name = COALESCE($1, name), code = COALESCE($2, code), \
             description = COALESCE($3, description), is_active = COALESCE($4, is_active) \
             WHERE id = $5 RETURNING id, name, code, description, is_active",
        )
        .bind(update.name)
        .bind(update.code)
        .bind(update.description)
        .bind(update.is_active)
        .bind(protocol_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("protocol {protocol_id}"), e))?;
        Ok(record.to_domain())
    }

    async fn delete_protocol(&self, protocol_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM protocols WHERE id = $1")
            .bind(protocol_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("protocol {protocol_id}")));
        }
        Ok(())
    }

    async fn toggle_protocol_active(&self, protocol_id: Uuid) -> PortResult<Protocol> {
        let record = sqlx::query_as::<_, ProtocolRecord>(
            "UPDATE protocols SET is_active = NOT is_active \
             WHERE id = $1 RETURNING id, name, code, description, is_active",
        )
        .bind(protocol_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("protocol {protocol_id}"), e))?;
        Ok(record.to_domain())
    }

    // --- Medical Standards ---

    async fn list_standards(&self) -> PortResult<Vec<MedicalStandard>> {
        let records = sqlx::query_as::<_, StandardRecord>(
            "SELECT id, name, category, description, criteria, is_active \
             FROM medical_standards ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(StandardRecord::to_domain).collect())
    }

    async fn create_standard(&self, new_standard: NewStandard) -> PortResult<MedicalStandard> {
        let record = sqlx::query_as::<_, StandardRecord>(
            "INSERT INTO medical_standards (id, name, category, description, criteria, is_active) \
             VALUES ($1, $2, $3, $4, $5, TRUE) \
             RETURNING id, name, category, description, criteria, is_active",
        )
        .bind(Uuid::new_v4())
        .bind(&new_standard.name)
        .bind(&new_standard.category)
        .bind(&new_standard.description)
        .bind(&new_standard.criteria)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err("standard", e))?;
        Ok(record.to_domain())
    }

    async fn update_standard(
        &self,
        standard_id: Uuid,
        update: StandardUpdate,
    ) -> PortResult<MedicalStandard> {
        let record = sqlx::query_as::<_, StandardRecord>(
            "UPDATE medical_standards SET name = COALESCE($1, name), \
             category = COALESCE($2, category), description = COALESCE($3, description), \
             criteria = COALESCE($4, criteria), is_active = COALESCE($5, is_active) \
             WHERE id = $6 RETURNING id, name, category, description, criteria, is_active",
        )
        .bind(update.name)
        .bind(update.category)
        .bind(update.description)
        .bind(update.criteria)
        .bind(update.is_active)
        .bind(standard_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("standard {standard_id}"), e))?;
        Ok(record.to_domain())
    }

    async fn delete_standard(&self, standard_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM medical_standards WHERE id = $1")
            .bind(standard_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("standard {standard_id}")));
        }
        Ok(())
    }

    async fn toggle_standard_active(&self, standard_id: Uuid) -> PortResult<MedicalStandard> {
        let record = sqlx::query_as::<_, StandardRecord>(
            "UPDATE medical_standards SET is_active = NOT is_active \
             WHERE id = $1 RETURNING id, name, category, description, criteria, is_active",
        )
        .bind(standard_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_err(&format!("standard {standard_id}"), e))?;
        Ok(record.to_domain())
    }
}
