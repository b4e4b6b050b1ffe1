use core_types::{DatasetRow, Direction, ModelArtifact};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::TrainingConfig;

/// `DatasetRow::features` is a sparse `(name, value)` vector; the catalog
/// does not guarantee identical ordering or presence across rows, so the
/// feature schema used for training is the sorted union of every name seen
/// across the rows passed to `fit`.
pub fn feature_schema(rows: &[DatasetRow]) -> Vec<String> {
    let mut names: Vec<String> = rows
        .iter()
        .flat_map(|r| r.features.iter().map(|(name, _)| name.clone()))
        .collect();
    names.sort();
    names.dedup();
    names
}

fn vectorize(row: &DatasetRow, schema: &[String]) -> Vec<f64> {
    schema
        .iter()
        .map(|name| {
            row.features
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        })
        .collect()
}

/// The model predicts P(outcome is WIN); LOSS and NEUTRAL are both treated
/// as the negative class during training. The continuous probability is
/// turned back into a three-way decision downstream via
/// `ModelThresholds::{win_probability, loss_probability}`, not here.
fn target_label(direction: Direction) -> f64 {
    match direction {
        Direction::Win => 1.0,
        Direction::Loss | Direction::Neutral => 0.0,
    }
}

struct Standardizer {
    means: Vec<f64>,
    stdevs: Vec<f64>,
}

impl Standardizer {
    fn fit(vectors: &[Vec<f64>], dim: usize) -> Self {
        let n = vectors.len() as f64;
        let mut means = vec![0.0; dim];
        for v in vectors {
            for (i, x) in v.iter().enumerate() {
                means[i] += x / n;
            }
        }
        let mut variances = vec![0.0; dim];
        for v in vectors {
            for (i, x) in v.iter().enumerate() {
                variances[i] += (x - means[i]).powi(2) / n;
            }
        }
        let stdevs = variances
            .into_iter()
            .map(|v| { let s = v.sqrt(); if s > 1e-9 { s } else { 1.0 } })
            .collect();
        Self { means, stdevs }
    }

    fn apply(&self, v: &[f64]) -> Vec<f64> {
        v.iter()
            .zip(self.means.iter())
            .zip(self.stdevs.iter())
            .map(|((x, m), s)| (x - m) / s)
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

pub fn predict_proba(artifact: &ModelArtifact, row: &DatasetRow) -> f64 {
    let raw = vectorize(row, &artifact.feature_names);
    let standardized: Vec<f64> = raw
        .iter()
        .zip(artifact.feature_means.iter())
        .zip(artifact.feature_stdevs.iter())
        .map(|((x, m), s)| (x - m) / s)
        .collect();
    let z: f64 = standardized
        .iter()
        .zip(artifact.weights.iter())
        .map(|(x, w)| x * w)
        .sum::<f64>()
        + artifact.bias;
    sigmoid(z)
}

fn log_loss(weights: &[f64], bias: f64, xs: &[Vec<f64>], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    xs.iter()
        .zip(ys.iter())
        .map(|(x, y)| {
            let z: f64 = x.iter().zip(weights.iter()).map(|(xi, w)| xi * w).sum::<f64>() + bias;
            let p = sigmoid(z).clamp(1e-10, 1.0 - 1e-10);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / n
}

/// Trains weights and bias via single-example SGD with L2 regularization,
/// shuffling example order each epoch under a seeded RNG so the run is
/// reproducible. Stops early once validation loss fails to improve for
/// `early_stop_patience` consecutive epochs.
pub fn fit(
    feature_names: Vec<String>,
    train: &[DatasetRow],
    validation: &[DatasetRow],
    config: &TrainingConfig,
) -> ModelArtifact {
    let dim = feature_names.len();
    let train_raw: Vec<Vec<f64>> = train.iter().map(|r| vectorize(r, &feature_names)).collect();
    let validation_raw: Vec<Vec<f64>> = validation.iter().map(|r| vectorize(r, &feature_names)).collect();

    let standardizer = Standardizer::fit(&train_raw, dim);
    let train_x: Vec<Vec<f64>> = train_raw.iter().map(|v| standardizer.apply(v)).collect();
    let validation_x: Vec<Vec<f64>> = validation_raw.iter().map(|v| standardizer.apply(v)).collect();
    let train_y: Vec<f64> = train.iter().map(|r| target_label(r.label)).collect();
    let validation_y: Vec<f64> = validation.iter().map(|r| target_label(r.label)).collect();

    let mut weights = vec![0.0; dim];
    let mut bias = 0.0;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut best_validation_loss = f64::MAX;
    let mut best_weights = weights.clone();
    let mut best_bias = bias;
    let mut epochs_without_improvement = 0u32;

    let mut order: Vec<usize> = (0..train_x.len()).collect();

    for _epoch in 0..config.max_epochs {
        order.shuffle(&mut rng);

        for &idx in &order {
            let x = &train_x[idx];
            let y = train_y[idx];
            let z: f64 = x.iter().zip(weights.iter()).map(|(xi, w)| xi * w).sum::<f64>() + bias;
            let p = sigmoid(z);
            let error = p - y;

            for (w, xi) in weights.iter_mut().zip(x.iter()) {
                let grad = error * xi + config.l2 * *w;
                *w -= config.learning_rate * grad;
            }
            bias -= config.learning_rate * error;
        }

        if validation_x.is_empty() {
            continue;
        }

        let validation_loss = log_loss(&weights, bias, &validation_x, &validation_y);
        if validation_loss < best_validation_loss - 1e-9 {
            best_validation_loss = validation_loss;
            best_weights = weights.clone();
            best_bias = bias;
            epochs_without_improvement = 0;
        } else {
            epochs_without_improvement += 1;
            if epochs_without_improvement >= config.early_stop_patience {
                break;
            }
        }
    }

    if validation_x.is_empty() {
        best_weights = weights;
        best_bias = bias;
    }

    ModelArtifact {
        feature_names,
        weights: best_weights,
        bias: best_bias,
        feature_means: standardizer.means,
        feature_stdevs: standardizer.stdevs,
    }
}
