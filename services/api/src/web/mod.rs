//! services/api/src/web/mod.rs
//!
//! The HTTP surface: handler modules, the router assembly and the OpenAPI
//! definition (documented coverage is the auth and transfer surfaces).

pub mod analytics;
pub mod auth;
pub mod error;
pub mod export;
pub mod governorates;
pub mod hospitals;
pub mod middleware;
pub mod patients;
pub mod protocols;
pub mod roles;
pub mod services;
pub mod standards;
pub mod state;
pub mod transfers;
pub mod upload;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Json, Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::logout_handler,
        auth::check_handler,
        transfers::list_pending_handler,
        transfers::approve_handler,
        transfers::reject_handler,
    ),
    components(schemas(
        auth::LoginRequest,
        auth::IdentityResponse,
        auth::ChangePasswordRequest,
        auth::ResetPasswordRequest,
        transfers::ResolveRequest,
    )),
    tags(
        (name = "Hospital Administration API", description = "Role-based administration of hospitals, patients and transfer requests.")
    )
)]
pub struct ApiDoc;

/// GET /health - Liveness probe.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Assembles the application router. CORS is layered on by the binary, which
/// knows the allowed client origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    let protected = Router::new()
        .route("/auth/check", get(auth::check_handler))
        .route("/auth/change-password", post(auth::change_password_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler))
        .route("/transfers/pending", get(transfers::list_pending_handler))
        .route("/transfers/{id}/approve", post(transfers::approve_handler))
        .route("/transfers/{id}/reject", post(transfers::reject_handler))
        .route(
            "/patients",
            get(patients::list_handler).post(patients::register_handler),
        )
        .route(
            "/patients/{id}",
            put(patients::update_handler).delete(patients::delete_handler),
        )
        .route(
            "/hospitals",
            get(hospitals::list_handler).post(hospitals::create_handler),
        )
        .route(
            "/hospitals/{id}",
            put(hospitals::update_handler).delete(hospitals::delete_handler),
        )
        .route(
            "/governorates",
            get(governorates::list_handler).post(governorates::create_handler),
        )
        .route(
            "/governorates/{id}",
            put(governorates::update_handler).delete(governorates::delete_handler),
        )
        .route("/users", get(users::list_handler).post(users::create_handler))
        .route(
            "/users/{id}",
            put(users::update_handler).delete(users::delete_handler),
        )
        .route("/users/{id}/toggle-active", patch(users::toggle_active_handler))
        .route("/roles", get(roles::list_handler).post(roles::create_handler))
        .route(
            "/roles/{id}",
            put(roles::update_handler).delete(roles::delete_handler),
        )
        .route(
            "/services",
            get(services::list_handler).post(services::create_handler),
        )
        .route(
            "/services/{id}",
            put(services::update_handler).delete(services::delete_handler),
        )
        .route(
            "/services/{id}/toggle-status",
            patch(services::toggle_status_handler),
        )
        .route(
            "/protocols",
            get(protocols::list_handler).post(protocols::create_handler),
        )
        .route(
            "/protocols/{id}",
            put(protocols::update_handler).delete(protocols::delete_handler),
        )
        .route(
            "/protocols/{id}/toggle-status",
            patch(protocols::toggle_status_handler),
        )
        .route(
            "/standards",
            get(standards::list_handler).post(standards::create_handler),
        )
        .route(
            "/standards/{id}",
            put(standards::update_handler).delete(standards::delete_handler),
        )
        .route(
            "/standards/{id}/toggle-status",
            patch(standards::toggle_status_handler),
        )
        .route("/analytics/kpis", get(analytics::kpis_handler))
        .route("/analytics/daily-patients", get(analytics::daily_patients_handler))
        .route(
            "/analytics/patients-by-governorate",
            get(analytics::patients_by_governorate_handler),
        )
        .route(
            "/analytics/transfers-by-hospital",
            get(analytics::transfers_by_hospital_handler),
        )
        .route("/export/hospitals", get(export::hospitals_handler))
        .route("/export/patients", get(export::patients_handler))
        .route("/export/transfers", get(export::transfers_handler))
        .route("/upload/governorates", post(upload::governorates_handler))
        .route("/upload/hospitals", post(upload::hospitals_handler))
        .route("/upload/patients", post(upload::patients_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", Router::new().merge(public).merge(protected))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}
