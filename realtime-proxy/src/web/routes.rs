//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tracing::warn;

use crate::domain::ProviderId;
use crate::provider::ProviderStatus;

use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(region_status))
        .route("/status/:provider_id", get(provider_status))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Health report of every provider in the region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionStatus {
    pub region: String,
    pub providers: Vec<ProviderStatus>,
}

async fn region_status(State(state): State<AppState>) -> Json<RegionStatus> {
    Json(RegionStatus {
        region: state.region.to_string(),
        providers: state.registry.statuses(),
    })
}

async fn provider_status(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
) -> Result<Json<ProviderStatus>, AppError> {
    let id = ProviderId::new(provider_id);
    state
        .registry
        .status(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: format!("Unknown provider {id}"),
        })
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound { message: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
        };

        warn!(%status, "{message}");

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
