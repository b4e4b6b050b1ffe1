use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use core_types::{Horizon, LifecycleEvent};
use model_lifecycle::parse_event_type;
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/events/:horizon_minutes", get(history))
        .route("/api/events/:horizon_minutes/last/:event_type", get(last_of_type))
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

async fn history(
    State(state): State<AppState>,
    Path(horizon_minutes): Path<u32>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<LifecycleEvent>>>, AppError> {
    let events = state.event_log.history(Horizon(horizon_minutes), query.limit).await?;
    Ok(Json(ApiResponse::success(events)))
}

async fn last_of_type(
    State(state): State<AppState>,
    Path((horizon_minutes, event_type)): Path<(u32, String)>,
) -> Result<Json<ApiResponse<Option<LifecycleEvent>>>, (StatusCode, Json<ApiResponse<()>>)> {
    let Some(parsed) = parse_event_type(&event_type) else {
        return Err((StatusCode::BAD_REQUEST, Json(ApiResponse::error(format!("unknown event type: {event_type}")))));
    };

    let event = state
        .event_log
        .last_of_type(Horizon(horizon_minutes), parsed)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::error(err.to_string()))))?;

    Ok(Json(ApiResponse::success(event)))
}
