use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use core_types::{Horizon, Symbol};
use serde::{Deserialize, Serialize};
use trainer::{ProgressSnapshot, TrainingConfig, TrainingRun, TrainingRunConfig};

use crate::{default_symbols, ApiResponse, AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/training", post(start_training)).route("/api/training/:run_id", get(get_progress))
}

#[derive(Deserialize)]
struct TrainingRequest {
    #[serde(default)]
    symbols: Vec<String>,
    horizon_minutes: u32,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
}

#[derive(Serialize)]
struct StartedRun {
    run_id: String,
}

async fn start_training(State(state): State<AppState>, Json(request): Json<TrainingRequest>) -> Result<Json<ApiResponse<StartedRun>>, AppError> {
    let symbols: Vec<Symbol> = if request.symbols.is_empty() {
        default_symbols()
    } else {
        request.symbols.iter().map(Symbol::new).collect()
    };

    let config = TrainingRunConfig {
        symbols,
        horizon: Horizon(request.horizon_minutes),
        window_start: request.window_start,
        window_end: request.window_end,
        training: TrainingConfig::default(),
    };

    let run = TrainingRun::new(config);
    let run_id = uuid::Uuid::new_v4().to_string();
    state.training_runs.insert(run_id.clone(), run.clone());

    let trainer = state.trainer.clone();
    tokio::spawn(async move {
        if let Err(err) = trainer.run(run).await {
            tracing::error!(%err, "training run failed");
        }
    });

    Ok(Json(ApiResponse::success(StartedRun { run_id })))
}

async fn get_progress(State(state): State<AppState>, Path(run_id): Path<String>) -> Result<Json<ApiResponse<ProgressSnapshot>>, AppError> {
    let run = state.training_runs.get(&run_id).ok_or_else(|| anyhow::anyhow!("unknown training run id: {run_id}"))?;
    Ok(Json(ApiResponse::success(run.progress())))
}
