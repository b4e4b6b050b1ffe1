use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use core_types::{Horizon, PerformanceWindow, TradeOutcome};
use model_lifecycle::performance::{compute_rolling, compute_window};
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/performance/:horizon_minutes/outcomes", post(record_outcome))
        .route("/api/performance/:horizon_minutes", get(window))
        .route("/api/performance/:horizon_minutes/rolling", get(rolling))
}

async fn record_outcome(
    State(state): State<AppState>,
    Path(horizon_minutes): Path<u32>,
    Json(outcome): Json<TradeOutcome>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let outcomes = state.trade_outcomes.lock().await;
    outcomes.entry(Horizon(horizon_minutes)).or_default().push(outcome);
    Ok(Json(ApiResponse::success(())))
}

#[derive(Deserialize)]
struct WindowQuery {
    #[serde(default = "default_window_days")]
    window_days: u32,
    #[serde(default)]
    shadow_only: bool,
}

fn default_window_days() -> u32 {
    30
}

async fn window(
    State(state): State<AppState>,
    Path(horizon_minutes): Path<u32>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ApiResponse<PerformanceWindow>>, AppError> {
    let horizon = Horizon(horizon_minutes);
    let outcomes = state.trade_outcomes.lock().await;
    let filtered: Vec<TradeOutcome> = outcomes
        .get(&horizon)
        .map(|v| v.iter().filter(|o| !query.shadow_only || o.is_shadow).cloned().collect())
        .unwrap_or_default();

    let result = compute_window(&filtered, query.window_days, Utc::now());
    Ok(Json(ApiResponse::success(result)))
}

async fn rolling(State(state): State<AppState>, Path(horizon_minutes): Path<u32>) -> Result<Json<ApiResponse<BTreeMap<u32, PerformanceWindow>>>, AppError> {
    let horizon = Horizon(horizon_minutes);
    let outcomes = state.trade_outcomes.lock().await;
    let filtered: Vec<TradeOutcome> = outcomes.get(&horizon).map(|v| v.clone()).unwrap_or_default();

    let result = compute_rolling(&filtered, Utc::now());
    Ok(Json(ApiResponse::success(result)))
}
