use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use core_types::{GuardrailState, Horizon};
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/guardrails/:horizon_minutes", get(get_state))
        .route("/api/guardrails/:horizon_minutes/kill-switch", post(set_kill_switch))
        .route("/api/guardrails/:horizon_minutes/promotion-lock", post(lock_promotion))
}

async fn get_state(State(state): State<AppState>, Path(horizon_minutes): Path<u32>) -> Result<Json<ApiResponse<GuardrailState>>, AppError> {
    let guardrail = state.guardrails.get(Horizon(horizon_minutes)).await?;
    Ok(Json(ApiResponse::success(guardrail)))
}

#[derive(Deserialize)]
struct KillSwitchRequest {
    engaged: bool,
}

async fn set_kill_switch(
    State(state): State<AppState>,
    Path(horizon_minutes): Path<u32>,
    Json(request): Json<KillSwitchRequest>,
) -> Result<Json<ApiResponse<GuardrailState>>, AppError> {
    let guardrail = state.guardrails.set_kill_switch(Horizon(horizon_minutes), request.engaged).await?;
    Ok(Json(ApiResponse::success(guardrail)))
}

#[derive(Deserialize)]
struct PromotionLockRequest {
    until: DateTime<Utc>,
}

async fn lock_promotion(
    State(state): State<AppState>,
    Path(horizon_minutes): Path<u32>,
    Json(request): Json<PromotionLockRequest>,
) -> Result<Json<ApiResponse<GuardrailState>>, AppError> {
    let guardrail = state.guardrails.lock_promotion_for(Horizon(horizon_minutes), request.until).await?;
    Ok(Json(ApiResponse::success(guardrail)))
}
