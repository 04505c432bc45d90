use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};

use crate::models::NewUser;
use super::{ApiError, AppState, HealthCheck, HealthResponse, MessageResponse};

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => HealthCheck::passed("database", "Database connection is active"),
        Err(e) => HealthCheck::failed("database", e.to_string()),
    };

    let refresh = if state.refresh_guard.is_running() {
        HealthCheck::passed("scheduler", "Refresh in progress")
    } else {
        HealthCheck::passed("scheduler", "Idle")
    };

    let stats = state.scheduler_stats.read().await.clone();
    let health = HealthResponse::from_checks(vec![database, refresh], stats);
    let status = if health.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(health))
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "Rejected registration body");
        ApiError::UnprocessableEntity("invalid json".to_string())
    })?;

    state.users.create(request).await?;
    Ok(Json(MessageResponse::success()))
}
