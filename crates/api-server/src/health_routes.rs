use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::{ApiResponse, AppState};

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<ApiResponse<Health>> {
    Json(ApiResponse::success(Health { status: "ok" }))
}
