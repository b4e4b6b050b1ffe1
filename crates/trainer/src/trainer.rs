use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_types::{Algorithm, DatasetRow, Horizon, Model, ModelThresholds, Symbol};
use ml_dataset::{DatasetBuilder, DatasetConfig, LabelConfig};
use observation_store::ObservationStore;

use crate::config::TrainingConfig;
use crate::error::{TrainerError, TrainerResult};
use crate::logistic::{feature_schema, fit};
use crate::metrics::{evaluate, Evaluation};
use crate::progress::{TrainingPhase, TrainingProgress, TrainingState};
use crate::split::temporal_split;

const MIN_TRAINING_ROWS: usize = 30;

#[derive(Debug, Clone)]
pub struct TrainingRunConfig {
    pub symbols: Vec<Symbol>,
    pub horizon: Horizon,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub training: TrainingConfig,
}

/// What a completed run hands back: the persistable `Model` document plus
/// the validation-set evaluation used for early stopping, kept around for
/// logging even though only the test-set evaluation becomes `model.metrics`.
pub struct TrainingOutcome {
    pub model: Model,
    pub validation_evaluation: Evaluation,
    pub test_evaluation: Evaluation,
}

/// One queued-to-terminal training job. Mirrors `BackfillRun`'s shape: a
/// config, a pollable progress object, and an independent cancel flag a
/// caller can flip without holding a lock on whatever task is driving it.
pub struct TrainingRun {
    pub config: TrainingRunConfig,
    progress: TrainingProgress,
    cancel: AtomicBool,
}

impl TrainingRun {
    pub fn new(config: TrainingRunConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            progress: TrainingProgress::new(),
            cancel: AtomicBool::new(false),
        })
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn progress(&self) -> crate::progress::ProgressSnapshot {
        self.progress.snapshot()
    }
}

pub struct Trainer {
    dataset_builder: DatasetBuilder,
}

impl Trainer {
    pub fn new(store: Arc<ObservationStore>) -> Self {
        Self::with_config(store, LabelConfig::default(), DatasetConfig::default())
    }

    pub fn with_config(store: Arc<ObservationStore>, label_config: LabelConfig, dataset_config: DatasetConfig) -> Self {
        Self {
            dataset_builder: DatasetBuilder::new(store, label_config, dataset_config),
        }
    }

    /// Drives one run to completion, mutating its progress object as it
    /// goes, and returns the trained artifact on success. The caller
    /// decides whether to persist the returned `Model` into a registry.
    pub async fn run(&self, run: Arc<TrainingRun>) -> TrainerResult<TrainingOutcome> {
        run.config.training.validate()?;
        run.progress.update(TrainingState::Running, TrainingPhase::Loading, 0.0, "loading dataset");

        let mut rows: Vec<DatasetRow> = Vec::new();
        for symbol in &run.config.symbols {
            if run.is_cancelled() {
                run.progress.update(TrainingState::Cancelled, TrainingPhase::Loading, 0.0, "cancelled");
                return Err(TrainerError::Cancelled);
            }
            let symbol_rows = self
                .dataset_builder
                .build_rows(symbol, run.config.horizon, run.config.window_start, run.config.window_end)
                .await?;
            rows.extend(symbol_rows);
        }

        if rows.len() < MIN_TRAINING_ROWS {
            run.progress.update(TrainingState::Failed, TrainingPhase::Loading, 0.0, "insufficient rows");
            return Err(TrainerError::InsufficientData { got: rows.len(), need: MIN_TRAINING_ROWS });
        }

        run.progress.update(TrainingState::Running, TrainingPhase::Splitting, 15.0, "splitting dataset");
        let split = temporal_split(rows, &run.config.training);

        if run.is_cancelled() {
            run.progress.update(TrainingState::Cancelled, TrainingPhase::Splitting, 15.0, "cancelled");
            return Err(TrainerError::Cancelled);
        }

        run.progress.update(TrainingState::Running, TrainingPhase::Training, 30.0, "training");
        let schema = feature_schema(&split.train);
        let artifact = fit(schema, &split.train, &split.validation, &run.config.training);

        if run.is_cancelled() {
            run.progress.update(TrainingState::Cancelled, TrainingPhase::Training, 60.0, "cancelled");
            return Err(TrainerError::Cancelled);
        }

        run.progress.update(TrainingState::Running, TrainingPhase::Evaluating, 75.0, "evaluating");
        let validation_evaluation = evaluate(
            &artifact,
            &split.validation,
            run.config.training.win_threshold,
            run.config.training.loss_threshold,
        );
        let test_evaluation = evaluate(
            &artifact,
            &split.test,
            run.config.training.win_threshold,
            run.config.training.loss_threshold,
        );

        run.progress.update(TrainingState::Running, TrainingPhase::Saving, 90.0, "saving model");
        let model = Model {
            id: uuid::Uuid::new_v4().to_string(),
            horizon: run.config.horizon,
            algorithm: Algorithm::LogisticRegression,
            trained_at: Utc::now(),
            seed: run.config.training.seed,
            training_window_start: run.config.window_start,
            training_window_end: run.config.window_end,
            artifact,
            metrics: test_evaluation.metrics,
            thresholds: ModelThresholds {
                win_probability: run.config.training.win_threshold,
                loss_probability: run.config.training.loss_threshold,
            },
        };

        run.progress.update(TrainingState::Completed, TrainingPhase::Saving, 100.0, "done");

        Ok(TrainingOutcome { model, validation_evaluation, test_evaluation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use core_types::{
        DataMode, IndicatorCategory, IndicatorValue, Observation, ObservationIndicatorMeta, ObservationSource,
        ObservationSourceMeta,
    };
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashMap;

    async fn seeded_store(n: usize) -> Arc<ObservationStore> {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let store = ObservationStore::new(pool);
        store.init_tables().await.unwrap();
        let store = Arc::new(store);

        let base = Utc::now() - Duration::minutes(60 * n as i64);
        for i in 0..n {
            let timestamp = base + Duration::minutes(60 * i as i64);
            // Alternate a strong up-move / down-move signature in the
            // feature so the classifier has something separable to learn.
            let trending_up = i % 2 == 0;
            let price = if trending_up { 100.0 + i as f64 } else { 100.0 - i as f64 * 0.1 };

            let mut indicators = HashMap::new();
            for f in 0..10 {
                let value = if trending_up { 80.0 + f as f64 } else { 20.0 - f as f64 };
                indicators.insert(
                    format!("f{f}"),
                    IndicatorValue::new(format!("f{f}"), IndicatorCategory::Momentum, value),
                );
            }

            let observation = Observation {
                id: format!("obs-{i}"),
                symbol: Symbol::new("BTCUSDT"),
                timestamp,
                last_price: price,
                mark_price: None,
                best_bid: Some(price - 0.1),
                best_ask: Some(price + 0.1),
                bar: None,
                indicators,
                regime: None,
                liquidation_cascade: false,
                patterns: vec![],
                source_meta: ObservationSourceMeta {
                    providers_used: vec!["mock".into()],
                    missing: vec![],
                    data_mode: DataMode::Live,
                },
                indicator_meta: ObservationIndicatorMeta {
                    completeness: 1.0,
                    count: 10,
                    missing_ids: vec![],
                    source: ObservationSource::Polling,
                },
            };
            store.append(&observation).await.unwrap();
        }

        store
    }

    #[tokio::test]
    async fn full_run_completes_and_produces_a_model() {
        let store = seeded_store(120).await;
        let trainer = Trainer::new(store);

        let run = TrainingRun::new(TrainingRunConfig {
            symbols: vec![Symbol::new("BTCUSDT")],
            horizon: Horizon::H1,
            window_start: Utc::now() - Duration::days(10),
            window_end: Utc::now(),
            training: TrainingConfig { max_epochs: 50, ..TrainingConfig::default() },
        });

        let outcome = trainer.run(run.clone()).await.unwrap();

        assert_eq!(run.progress().state, TrainingState::Completed);
        assert_eq!(outcome.model.horizon, Horizon::H1);
        assert!(outcome.test_evaluation.metrics.sample_count > 0 || outcome.validation_evaluation.metrics.sample_count > 0);
    }

    #[tokio::test]
    async fn insufficient_rows_fails_without_panicking() {
        let store = seeded_store(3).await;
        let trainer = Trainer::new(store);

        let run = TrainingRun::new(TrainingRunConfig {
            symbols: vec![Symbol::new("BTCUSDT")],
            horizon: Horizon::H1,
            window_start: Utc::now() - Duration::days(10),
            window_end: Utc::now(),
            training: TrainingConfig::default(),
        });

        let result = trainer.run(run.clone()).await;
        assert!(result.is_err());
        assert_eq!(run.progress().state, TrainingState::Failed);
    }
}
