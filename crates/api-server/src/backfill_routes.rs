use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use backfill_engine::{BackfillConfigError, BackfillRun, BackfillRunConfig, ProgressSnapshot};
use chrono::{DateTime, Utc};
use core_types::{Horizon, Symbol, Timeframe};
use serde::{Deserialize, Serialize};

use crate::{default_symbols, ApiResponse, AppError, AppState};

/// `ProgressSnapshot::eta` is a `chrono::Duration`, which this workspace's
/// chrono version doesn't derive `Serialize` for; flatten it to seconds
/// rather than pull in a newer chrono just for this one field.
#[derive(Serialize)]
struct BackfillProgressResponse {
    state: String,
    candles_processed: u64,
    observations_written: u64,
    ml_rows_written: u64,
    total_bars_estimate: u64,
    last_processed_timestamp: Option<DateTime<Utc>>,
    eta_seconds: Option<i64>,
}

impl From<ProgressSnapshot> for BackfillProgressResponse {
    fn from(snapshot: ProgressSnapshot) -> Self {
        Self {
            state: snapshot.state.to_string(),
            candles_processed: snapshot.candles_processed,
            observations_written: snapshot.observations_written,
            ml_rows_written: snapshot.ml_rows_written,
            total_bars_estimate: snapshot.total_bars_estimate,
            last_processed_timestamp: snapshot.last_processed_timestamp,
            eta_seconds: snapshot.eta.map(|d| d.num_seconds()),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/backfill", post(start_backfill))
        .route("/api/backfill/:run_id", get(get_progress))
        .route("/api/backfill/:run_id/cancel", post(cancel_run))
}

#[derive(Deserialize)]
struct BackfillRequest {
    #[serde(default)]
    symbols: Vec<String>,
    days: u32,
    #[serde(default = "default_timeframe")]
    timeframe: String,
    horizon_minutes: u32,
    #[serde(default)]
    provider_id: Option<String>,
    #[serde(default)]
    dry_run: bool,
}

fn default_timeframe() -> String {
    "m1".to_string()
}

#[derive(Serialize)]
struct StartedRun {
    run_id: String,
}

fn parse_timeframe(s: &str) -> Result<Timeframe, AppError> {
    match s.to_lowercase().as_str() {
        "m1" => Ok(Timeframe::M1),
        "m5" => Ok(Timeframe::M5),
        "m15" => Ok(Timeframe::M15),
        other => Err(anyhow::anyhow!("unsupported timeframe for backfill: {other}").into()),
    }
}

async fn start_backfill(State(state): State<AppState>, Json(request): Json<BackfillRequest>) -> Result<Json<ApiResponse<StartedRun>>, AppError> {
    let symbols = if request.symbols.is_empty() {
        default_symbols()
    } else {
        request.symbols.iter().map(Symbol::new).collect()
    };
    let timeframe = parse_timeframe(&request.timeframe)?;

    let config = BackfillRunConfig::new(symbols, request.days, timeframe, request.provider_id, Horizon(request.horizon_minutes), request.dry_run)
        .map_err(|BackfillConfigError(msg)| anyhow::anyhow!(msg))?;

    let run = BackfillRun::new(config);
    let run_id = uuid::Uuid::new_v4().to_string();
    state.backfill_runs.insert(run_id.clone(), run.clone());

    let engine = state.backfill_engine.clone();
    tokio::spawn(async move {
        engine.run(run).await;
    });

    Ok(Json(ApiResponse::success(StartedRun { run_id })))
}

async fn get_progress(State(state): State<AppState>, Path(run_id): Path<String>) -> Result<Json<ApiResponse<BackfillProgressResponse>>, AppError> {
    let run = state.backfill_runs.get(&run_id).ok_or_else(|| anyhow::anyhow!("unknown backfill run id: {run_id}"))?;
    Ok(Json(ApiResponse::success(run.progress().into())))
}

async fn cancel_run(State(state): State<AppState>, Path(run_id): Path<String>) -> Result<Json<ApiResponse<()>>, AppError> {
    let run = state.backfill_runs.get(&run_id).ok_or_else(|| anyhow::anyhow!("unknown backfill run id: {run_id}"))?;
    run.cancel();
    Ok(Json(ApiResponse::success(())))
}
