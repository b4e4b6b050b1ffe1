use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use core_types::{Horizon, LifecycleEvent, ModelRegistryEntry};
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/models/:horizon_minutes", get(get_registry_entry))
        .route("/api/models/:horizon_minutes/promote", post(promote))
        .route("/api/models/:horizon_minutes/rollback", post(rollback))
        .route("/api/models/:horizon_minutes/shadow", post(set_shadow))
}

async fn get_registry_entry(State(state): State<AppState>, Path(horizon_minutes): Path<u32>) -> Result<Json<ApiResponse<ModelRegistryEntry>>, AppError> {
    let entry = state.model_registry.get(Horizon(horizon_minutes)).await?;
    Ok(Json(ApiResponse::success(entry)))
}

#[derive(Deserialize)]
struct PromoteRequest {
    candidate_model_id: String,
}

async fn promote(
    State(state): State<AppState>,
    Path(horizon_minutes): Path<u32>,
    Json(request): Json<PromoteRequest>,
) -> Result<Json<ApiResponse<LifecycleEvent>>, AppError> {
    let event = state.model_registry.promote(Horizon(horizon_minutes), &request.candidate_model_id).await?;
    state.event_log.record(&event).await?;
    state.guardrails.record_promotion(Horizon(horizon_minutes)).await?;
    Ok(Json(ApiResponse::success(event)))
}

#[derive(Deserialize)]
struct RollbackRequest {
    reason: String,
}

async fn rollback(
    State(state): State<AppState>,
    Path(horizon_minutes): Path<u32>,
    Json(request): Json<RollbackRequest>,
) -> Result<Json<ApiResponse<LifecycleEvent>>, AppError> {
    let event = state.model_registry.rollback(Horizon(horizon_minutes), &request.reason).await?;
    state.event_log.record(&event).await?;
    state.guardrails.record_rollback(Horizon(horizon_minutes)).await?;
    Ok(Json(ApiResponse::success(event)))
}

#[derive(Deserialize)]
struct ShadowRequest {
    shadow_model_id: String,
}

async fn set_shadow(
    State(state): State<AppState>,
    Path(horizon_minutes): Path<u32>,
    Json(request): Json<ShadowRequest>,
) -> Result<Json<ApiResponse<Option<LifecycleEvent>>>, AppError> {
    let event = state.model_registry.set_shadow(Horizon(horizon_minutes), &request.shadow_model_id).await?;
    if let Some(event) = &event {
        state.event_log.record(event).await?;
    }
    Ok(Json(ApiResponse::success(event)))
}
