use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use core_types::{
    Candle, CandleSet, DataMode, DatasetRow, MarketSnapshot, Observation, ObservationSource,
    ObservationSourceMeta, Symbol, Timeframe,
};
use ml_dataset::{DatasetConfig, LabelConfig, OutcomeBuilder};
use observation_pipeline::{build_indicator_snapshot, classify};
use observation_store::ObservationStore;
use provider_core::{ProviderError, ProviderRegistry, SymbolResolver};
use tokio::sync::Mutex;

use crate::config::{BackfillRunConfig, MAX_CHUNK_BARS, WARMUP_BARS};
use crate::progress::{BackfillState, ProgressSnapshot, RunProgress};

const RATE_LIMIT_PAUSE: StdDuration = StdDuration::from_secs(5);

/// One cancellable, resumable-in-spirit historical ingestion job. Owns its
/// own progress object and cancellation flag so a caller can poll/cancel it
/// without holding a lock on the engine that's driving it.
pub struct BackfillRun {
    pub config: BackfillRunConfig,
    progress: RunProgress,
    cancel: AtomicBool,
    ml_rows: Mutex<Vec<DatasetRow>>,
}

impl BackfillRun {
    pub fn new(config: BackfillRunConfig) -> Arc<Self> {
        let total = config.total_bars_requested() * config.symbols.len() as u64;
        Arc::new(Self {
            config,
            progress: RunProgress::new(total),
            cancel: AtomicBool::new(false),
            ml_rows: Mutex::new(Vec::new()),
        })
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub async fn ml_rows(&self) -> Vec<DatasetRow> {
        self.ml_rows.lock().await.clone()
    }
}

pub struct BackfillEngine {
    registry: Arc<ProviderRegistry>,
    resolver: Arc<SymbolResolver>,
    store: Arc<ObservationStore>,
    label_config: LabelConfig,
    dataset_config: DatasetConfig,
}

impl BackfillEngine {
    pub fn new(registry: Arc<ProviderRegistry>, resolver: Arc<SymbolResolver>, store: Arc<ObservationStore>) -> Self {
        Self {
            registry,
            resolver,
            store,
            label_config: LabelConfig::default(),
            dataset_config: DatasetConfig::default(),
        }
    }

    /// Drives one run to completion (or until cancelled/failed), mutating
    /// its progress object as it goes. Returns once every symbol has been
    /// processed; the caller typically spawns this on its own task.
    pub async fn run(&self, run: Arc<BackfillRun>) {
        run.progress.set_state(BackfillState::Running);

        for symbol in run.config.symbols.clone() {
            if run.is_cancelled() {
                run.progress.set_state(BackfillState::Cancelled);
                return;
            }
            if let Err(err) = self.run_symbol(&run, &symbol).await {
                tracing::error!(%symbol, %err, "backfill failed for symbol");
                run.progress.set_state(BackfillState::Failed);
                return;
            }
        }

        if run.is_cancelled() {
            run.progress.set_state(BackfillState::Cancelled);
        } else {
            run.progress.set_state(BackfillState::Done);
        }
    }

    async fn run_symbol(&self, run: &Arc<BackfillRun>, symbol: &Symbol) -> Result<(), String> {
        let provider = if let Some(id) = &run.config.provider_id {
            self.registry
                .get(id)
                .map(|e| e.provider)
                .ok_or_else(|| format!("unknown provider id: {id}"))?
        } else {
            self.resolver.resolve(symbol).await.provider
        };

        let total_bars = run.config.total_bars_requested();
        let mut candles: Vec<Candle> = Vec::new();

        while (candles.len() as u64) < total_bars {
            let remaining = total_bars - candles.len() as u64;
            let chunk_size = remaining.min(MAX_CHUNK_BARS as u64) as u32;

            let fetched = match provider.get_candles(symbol, run.config.timeframe, chunk_size).await {
                Ok(c) => c,
                Err(ProviderError::RateLimited { .. }) => {
                    tracing::debug!(%symbol, "rate limited during backfill, pausing");
                    tokio::time::sleep(RATE_LIMIT_PAUSE).await;
                    continue;
                }
                Err(err) => return Err(err.to_string()),
            };

            if fetched.is_empty() {
                break;
            }

            let new_count = fetched
                .iter()
                .filter(|c| !candles.iter().any(|existing| existing.open_time == c.open_time))
                .count();
            candles.extend(fetched);
            candles.sort_by_key(|c| c.open_time);
            candles.dedup_by_key(|c| c.open_time);

            // Providers here expose only "most recent N candles", with no
            // since/until pagination, so a repeat call cannot surface older
            // bars than the first. Stop once a fetch adds nothing new.
            if new_count == 0 {
                break;
            }
        }

        if candles.len() <= WARMUP_BARS {
            tracing::debug!(%symbol, got = candles.len(), "not enough candles beyond warmup window");
            return Ok(());
        }

        let outcome_builder = OutcomeBuilder::new(self.store.clone(), self.label_config);

        for idx in WARMUP_BARS..candles.len() {
            if run.is_cancelled() {
                return Ok(());
            }

            let window = &candles[..=idx];
            let candle = &candles[idx];
            run.progress.record_candle(candle.open_time);

            let observation = self.synthesize_observation(symbol, window);

            if !run.config.dry_run {
                self.store
                    .append(&observation)
                    .await
                    .map_err(|e| format!("append failed: {e}"))?;
                run.progress.record_observation();

                if let Ok(Some(outcome)) = outcome_builder.build(symbol, run.config.horizon, &observation).await {
                    let row = DatasetRow {
                        symbol: symbol.clone(),
                        horizon: run.config.horizon,
                        t0: observation.timestamp,
                        features: observation.indicators.iter().map(|(id, v)| (id.clone(), v.value)).collect(),
                        label: outcome.direction,
                        return_pct: outcome.return_pct,
                        data_mode: DataMode::Backfill,
                    };
                    if row.features.len() >= self.dataset_config.min_features {
                        run.ml_rows.lock().await.push(row);
                        run.progress.record_ml_row();
                    }
                }
            }
        }

        Ok(())
    }

    fn synthesize_observation(&self, symbol: &Symbol, window: &[Candle]) -> Observation {
        let candle = window.last().expect("window is non-empty by construction");
        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();

        let mut by_timeframe = HashMap::new();
        by_timeframe.insert(Timeframe::M1.as_str().to_string(), window.to_vec());
        let candle_set = CandleSet { by_timeframe };

        let snapshot = MarketSnapshot {
            symbol: symbol.clone(),
            provider_id: "backfill".to_string(),
            timestamp: candle.open_time,
            last_price: candle.close,
            mark_price: None,
            index_price: None,
            best_bid: None,
            best_ask: None,
            day: None,
            order_book: None,
            trades: None,
            open_interest: None,
            funding: None,
            liquidations: None,
            candles: Some(candle_set),
        };

        let input = core_types::IndicatorInput {
            symbol,
            snapshot: &snapshot,
            closes: &closes,
            candles: window,
        };

        let (indicators, mut indicator_meta) = build_indicator_snapshot(&input, ObservationSource::Backfill);
        indicator_meta.source = ObservationSource::Backfill;
        let regime_label = classify(&indicators);

        Observation {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.clone(),
            timestamp: candle.open_time,
            last_price: candle.close,
            mark_price: None,
            best_bid: None,
            best_ask: None,
            bar: Some(core_types::OhlcvBar {
                open: candle.open,
                high: candle.high,
                low: candle.low,
                close: candle.close,
                volume: candle.volume,
            }),
            indicators,
            regime: Some(regime_label),
            liquidation_cascade: false,
            patterns: Vec::new(),
            source_meta: ObservationSourceMeta {
                providers_used: vec!["backfill".to_string()],
                missing: snapshot.missing_fields(),
                data_mode: DataMode::Backfill,
            },
            indicator_meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackfillRunConfig;
    use crate::progress::BackfillState;
    use core_types::{Horizon, Symbol};
    use provider_core::ProviderRegistry;
    use provider_mock::MockProvider;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn test_engine() -> BackfillEngine {
        let registry = Arc::new(ProviderRegistry::new(Arc::new(MockProvider::new())));
        let resolver = Arc::new(SymbolResolver::new(registry.clone()));
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let store = Arc::new(ObservationStore::new(pool));
        store.init_tables().await.unwrap();
        BackfillEngine::new(registry, resolver, store)
    }

    #[tokio::test]
    async fn completes_a_small_run_and_writes_observations_past_warmup() {
        let engine = test_engine().await;
        let config = BackfillRunConfig::new(
            vec![Symbol::new("BTCUSDT")],
            1,
            Timeframe::M1,
            Some(provider_core::MOCK_PROVIDER_ID.to_string()),
            Horizon::H1,
            false,
        )
        .unwrap();
        let run = BackfillRun::new(config);

        engine.run(run.clone()).await;

        let snapshot = run.progress();
        assert_eq!(snapshot.state, BackfillState::Done);
        assert!(snapshot.observations_written > 0);
    }

    #[tokio::test]
    async fn dry_run_produces_no_writes() {
        let engine = test_engine().await;
        let config = BackfillRunConfig::new(
            vec![Symbol::new("ETHUSDT")],
            1,
            Timeframe::M1,
            Some(provider_core::MOCK_PROVIDER_ID.to_string()),
            Horizon::H1,
            true,
        )
        .unwrap();
        let run = BackfillRun::new(config);

        engine.run(run.clone()).await;

        let snapshot = run.progress();
        assert_eq!(snapshot.state, BackfillState::Done);
        assert_eq!(snapshot.observations_written, 0);
    }
}
