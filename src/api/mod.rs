pub mod reports;

use axum::routing::{get, post};
use axum::{Json, Router, extract::State, http::StatusCode};

use crate::error::AppError;
use crate::services::denormalize;
use crate::services::{SyncReport, SyncService};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sync", post(sync_now))
        .route("/api/sync/reset", post(reset_and_sync))
        .route("/api/denormalize", post(denormalize_now))
        .route("/api/dashboard/stats", get(reports::dashboard_stats))
        .route("/api/at-risk", get(reports::at_risk_students))
        .route("/api/at-risk/explain", post(reports::explain_at_risk))
        .route("/api/silent", get(reports::silent_students))
        .route("/api/silent/explain", post(reports::explain_silence))
        .route("/api/teachers", get(reports::teachers_overview))
        .route("/api/teachers/{user_id}/courses", get(reports::teacher_courses))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn sync_now(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    // The store is only safe under one sync at a time.
    let _guard = state
        .sync_lock
        .try_lock()
        .map_err(|_| AppError::Conflict("A sync is already running".to_string()))?;

    let report = sync_service(&state).run_sync().await?;
    Ok(Json(report))
}

async fn reset_and_sync(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    let _guard = state
        .sync_lock
        .try_lock()
        .map_err(|_| AppError::Conflict("A sync is already running".to_string()))?;

    let report = sync_service(&state).reset_and_sync().await?;
    Ok(Json(report))
}

/// Standalone denormalization for repair; normally it runs as part of sync.
async fn denormalize_now(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    denormalize::recompute_all(&state.db).await;
    state.cache.invalidate_all();
    Ok(StatusCode::NO_CONTENT)
}

fn sync_service(state: &AppState) -> SyncService {
    SyncService::new(
        state.db.clone(),
        state.classroom.clone(),
        state.cache.clone(),
        state.config.sync_accounts.clone(),
        state.config.enable_assignments_sync,
    )
}
