mod backfill_routes;
mod event_routes;
mod guardrail_routes;
mod health_routes;
mod performance_routes;
mod registry_routes;
mod request_id;
mod security_headers;
mod training_routes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use backfill_engine::{BackfillEngine, BackfillRun};
use core_types::{Horizon, Symbol, TradeOutcome};
use dashmap::DashMap;
use model_lifecycle::{EventLog, GuardrailStore, ModelRegistry};
use observation_store::ObservationStore;
use provider_core::{ProviderRegistry, SymbolResolver};
use provider_mock::MockProvider;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use trainer::{Trainer, TrainingRun};

/// Uniform envelope every handler returns, success or failure.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }
}

/// Adapts any error into a 500 with the standard envelope. Handlers return
/// `Result<_, AppError>` and use `?` freely against thiserror-based crate
/// errors, mirroring the teacher's anyhow-wrapped-in-AppError idiom.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub observation_store: Arc<ObservationStore>,
    pub backfill_engine: Arc<BackfillEngine>,
    pub trainer: Arc<Trainer>,
    pub model_registry: Arc<ModelRegistry>,
    pub guardrails: Arc<GuardrailStore>,
    pub event_log: Arc<EventLog>,
    pub backfill_runs: Arc<DashMap<String, Arc<BackfillRun>>>,
    pub training_runs: Arc<DashMap<String, Arc<TrainingRun>>>,
    /// Realized trade outcomes kept in-process for performance-window
    /// queries. The core persists observations and lifecycle state; what
    /// model actually acted on a signal is a trading-loop concern entirely
    /// out of scope here, so this surface accepts outcomes by API call
    /// rather than deriving them from storage.
    pub trade_outcomes: Arc<Mutex<DashMap<Horizon, Vec<TradeOutcome>>>>,
}

pub async fn build_pool(database_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new().max_connections(10).connect(database_url).await?;
    Ok(pool)
}

pub async fn build_state(pool: SqlitePool) -> anyhow::Result<AppState> {
    let observation_store = Arc::new(ObservationStore::new(pool.clone()));
    observation_store.init_tables().await?;

    let mock = Arc::new(MockProvider::new());
    let registry = Arc::new(ProviderRegistry::new(mock));
    let resolver = Arc::new(SymbolResolver::new(registry.clone()));
    let backfill_engine = Arc::new(BackfillEngine::new(registry, resolver, observation_store.clone()));

    let trainer = Arc::new(Trainer::new(observation_store.clone()));

    let model_registry = Arc::new(ModelRegistry::new(pool.clone()));
    model_registry.init_tables().await?;

    let event_log = Arc::new(EventLog::new(pool.clone()));
    event_log.init_tables().await?;

    let guardrails = Arc::new(GuardrailStore::new(pool, event_log.clone()));
    guardrails.init_tables().await?;

    Ok(AppState {
        observation_store,
        backfill_engine,
        trainer,
        model_registry,
        guardrails,
        event_log,
        backfill_runs: Arc::new(DashMap::new()),
        training_runs: Arc::new(DashMap::new()),
        trade_outcomes: Arc::new(Mutex::new(DashMap::new())),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes::routes())
        .merge(backfill_routes::routes())
        .merge(training_routes::routes())
        .merge(registry_routes::routes())
        .merge(performance_routes::routes())
        .merge(guardrail_routes::routes())
        .merge(event_routes::routes())
        .layer(middleware::from_fn(security_headers::security_headers_middleware))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(tower::timeout::TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

/// Placeholder symbol set used when a caller doesn't name symbols
/// explicitly; kept tiny and deterministic rather than reading live catalogs.
pub fn default_symbols() -> Vec<Symbol> {
    vec![Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")]
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let pool = build_pool(&database_url).await?;
    let state = build_state(pool).await?;
    let router = build_router(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "api-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
