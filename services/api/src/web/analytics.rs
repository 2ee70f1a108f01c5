//! services/api/src/web/analytics.rs
//!
//! Read-only aggregate views for the dashboards.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::web::error::{HttpError, HttpResult};
use crate::web::state::AppState;
use hospital_core::auth::{AuthContext, DATA_OFFICER, DOCTOR, HOSPITAL_ADMIN, NURSE, SYSTEM_ADMIN};
use hospital_core::ports::{DailyCount, GroupCount, KpiCounts};

#[derive(Deserialize, Default)]
pub struct DailyQuery {
    /// Window length in days; defaults to the last week.
    pub days: Option<i64>,
}

/// GET /api/analytics/kpis
pub async fn kpis_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> HttpResult<Json<KpiCounts>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    Ok(Json(state.db.kpi_counts().await?))
}

/// GET /api/analytics/daily-patients?days=N
pub async fn daily_patients_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<DailyQuery>,
) -> HttpResult<Json<Vec<DailyCount>>> {
    ctx.require_role(&[SYSTEM_ADMIN, DOCTOR, NURSE])?;
    let days = query.days.unwrap_or(7);
    if !(1..=365).contains(&days) {
        return Err(HttpError::validation("days must be between 1 and 365"));
    }
    let since = Utc::now() - Duration::days(days);
    Ok(Json(state.db.daily_patient_counts(since).await?))
}

/// GET /api/analytics/patients-by-governorate
pub async fn patients_by_governorate_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<GroupCount>>> {
    ctx.require_role(&[SYSTEM_ADMIN, DATA_OFFICER])?;
    Ok(Json(state.db.patients_by_governorate().await?))
}

/// GET /api/analytics/transfers-by-hospital
pub async fn transfers_by_hospital_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> HttpResult<Json<Vec<GroupCount>>> {
    ctx.require_role(&[SYSTEM_ADMIN, HOSPITAL_ADMIN])?;
    Ok(Json(state.db.transfers_by_hospital().await?))
}
