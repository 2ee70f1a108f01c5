//! services/api/src/web/hospitals.rs
//!
//! Facility directory: a paged, filterable list readable by any
//! authenticated caller, and system-admin-only mutation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::web::error::HttpResult;
use crate::web::state::AppState;
use hospital_core::auth::{AuthContext, SYSTEM_ADMIN};
use hospital_core::domain::Hospital;
use hospital_core::ports::{HospitalFilter, HospitalPage, HospitalUpdate, NewHospital};

#[derive(Deserialize, Default)]
pub struct HospitalListQuery {
    pub search: Option<String>,
    pub governorate: Option<String>,
    pub min_icu_beds: Option<i32>,
    pub min_pediatric_beds: Option<i32>,
    pub min_incubators: Option<i32>,
    pub min_newborn_beds: Option<i32>,
    pub min_medium_care_beds: Option<i32>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateHospitalRequest {
    pub code: String,
    pub name: String,
    pub governorate_id: Option<Uuid>,
    #[serde(default)]
    pub icu_beds: i32,
    #[serde(default)]
    pub pediatric_beds: i32,
    #[serde(default)]
    pub incubators: i32,
    #[serde(default)]
    pub newborn_beds: i32,
    #[serde(default)]
    pub medium_care_beds: i32,
}

#[derive(Deserialize, Default)]
pub struct UpdateHospitalRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub governorate_id: Option<Uuid>,
    pub icu_beds: Option<i32>,
    pub pediatric_beds: Option<i32>,
    pub incubators: Option<i32>,
    pub newborn_beds: Option<i32>,
    pub medium_care_beds: Option<i32>,
}

/// GET /api/hospitals - Paged list with search and capacity filters.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(_ctx): Extension<AuthContext>,
    Query(query): Query<HospitalListQuery>,
) -> HttpResult<Json<HospitalPage>> {
    let defaults = HospitalFilter::default();
    let page = state
        .db
        .list_hospitals(HospitalFilter {
            search: query.search,
            governorate: query.governorate,
            min_icu_beds: query.min_icu_beds,
            min_pediatric_beds: query.min_pediatric_beds,
            min_incubators: query.min_incubators,
            min_newborn_beds: query.min_newborn_beds,
            min_medium_care_beds: query.min_medium_care_beds,
            page: query.page.unwrap_or(defaults.page),
            limit: query.limit.unwrap_or(defaults.limit),
        })
        .await?;
    Ok(Json(page))
}

/// POST /api/hospitals
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateHospitalRequest>,
) -> HttpResult<impl IntoResponse> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let hospital = state
        .db
        .create_hospital(NewHospital {
            code: req.code,
            name: req.name,
            governorate_id: req.governorate_id,
            icu_beds: req.icu_beds,
            pediatric_beds: req.pediatric_beds,
            incubators: req.incubators,
            newborn_beds: req.newborn_beds,
            medium_care_beds: req.medium_care_beds,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(hospital)))
}

/// PUT /api/hospitals/{id}
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateHospitalRequest>,
) -> HttpResult<Json<Hospital>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    let hospital = state
        .db
        .update_hospital(
            id,
            HospitalUpdate {
                code: req.code,
                name: req.name,
                governorate_id: req.governorate_id,
                icu_beds: req.icu_beds,
                pediatric_beds: req.pediatric_beds,
                incubators: req.incubators,
                newborn_beds: req.newborn_beds,
                medium_care_beds: req.medium_care_beds,
            },
        )
        .await?;
    Ok(Json(hospital))
}

/// DELETE /api/hospitals/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<serde_json::Value>> {
    ctx.require_role(&[SYSTEM_ADMIN])?;
    state.db.delete_hospital(id).await?;
    Ok(Json(serde_json::json!({ "message": "hospital deleted" })))
}
