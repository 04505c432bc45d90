use axum::{
    error_handling::HandleErrorLayer,
    routing::{get, post},
    BoxError, Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::scheduler::{RunGuard, SchedulerStats};
use crate::storage::UserRepository;

pub mod handlers;
pub mod responses;

pub use handlers::{create_user, health_check};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserRepository>,
    pub pool: SqlitePool,
    pub refresh_guard: RunGuard,
    pub scheduler_stats: Arc<RwLock<SchedulerStats>>,
}

pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive())
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(request_timeout),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new().route("/users", post(create_user))
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::RequestTimeout
    } else {
        ApiError::InternalServerError(format!("Unhandled middleware error: {}", err))
    }
}
