use core_types::{DatasetRow, Direction, ModelArtifact, ModelMetrics};
use statrs::statistics::Statistics;

use crate::logistic::predict_proba;

/// Three-way decision derived from a continuous win-probability using the
/// same thresholds that will later gate live inference.
fn classify(p: f64, win_threshold: f64, loss_threshold: f64) -> Direction {
    if p >= win_threshold {
        Direction::Win
    } else if p <= loss_threshold {
        Direction::Loss
    } else {
        Direction::Neutral
    }
}

fn class_index(d: Direction) -> usize {
    match d {
        Direction::Win => 0,
        Direction::Loss => 1,
        Direction::Neutral => 2,
    }
}

/// `matrix[actual][predicted]` over the fixed class order Win/Loss/Neutral.
pub struct ConfusionMatrix {
    pub matrix: [[u64; 3]; 3],
}

impl ConfusionMatrix {
    pub const CLASS_ORDER: [Direction; 3] = [Direction::Win, Direction::Loss, Direction::Neutral];

    fn record(&mut self, actual: Direction, predicted: Direction) {
        self.matrix[class_index(actual)][class_index(predicted)] += 1;
    }

    fn precision_recall_f1(&self, class: usize) -> (f64, f64, f64) {
        let tp = self.matrix[class][class] as f64;
        let predicted_positive: f64 = (0..3).map(|a| self.matrix[a][class] as f64).sum();
        let actual_positive: f64 = self.matrix[class].iter().sum::<u64>() as f64;

        let precision = if predicted_positive > 0.0 { tp / predicted_positive } else { 0.0 };
        let recall = if actual_positive > 0.0 { tp / actual_positive } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        (precision, recall, f1)
    }
}

/// Per-class precision/recall/F1 alongside the aggregate metrics stored on
/// the `Model` document; the aggregate collapses to macro-averaged
/// precision/recall/F1 since `ModelMetrics` carries one number per stat.
pub struct Evaluation {
    pub metrics: ModelMetrics,
    pub confusion: ConfusionMatrix,
    pub per_class: [(f64, f64, f64); 3],
}

fn binary_auc(probabilities: &[f64], positives: &[bool]) -> Option<f64> {
    let n_pos = positives.iter().filter(|p| **p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut ranked: Vec<(f64, bool)> = probabilities.iter().copied().zip(positives.iter().copied()).collect();
    ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let mut rank_sum_positive = 0.0;
    let mut idx = 0usize;
    while idx < ranked.len() {
        let mut j = idx;
        while j + 1 < ranked.len() && ranked[j + 1].0 == ranked[idx].0 {
            j += 1;
        }
        let avg_rank = ((idx + 1) + (j + 1)) as f64 / 2.0;
        for k in idx..=j {
            if ranked[k].1 {
                rank_sum_positive += avg_rank;
            }
        }
        idx = j + 1;
    }

    let u = rank_sum_positive - (n_pos as f64 * (n_pos as f64 + 1.0)) / 2.0;
    Some(u / (n_pos as f64 * n_neg as f64))
}

pub fn evaluate(artifact: &ModelArtifact, rows: &[DatasetRow], win_threshold: f64, loss_threshold: f64) -> Evaluation {
    let mut confusion = ConfusionMatrix { matrix: [[0; 3]; 3] };
    let mut probabilities = Vec::with_capacity(rows.len());
    let mut positives = Vec::with_capacity(rows.len());
    let mut brier_terms = Vec::with_capacity(rows.len());
    let mut correct = 0u64;

    for row in rows {
        let p = predict_proba(artifact, row);
        let predicted = classify(p, win_threshold, loss_threshold);
        confusion.record(row.label, predicted);
        if predicted == row.label {
            correct += 1;
        }

        let is_win = matches!(row.label, Direction::Win);
        let y = if is_win { 1.0 } else { 0.0 };
        brier_terms.push((p - y).powi(2));
        probabilities.push(p);
        positives.push(is_win);
    }

    let n = rows.len().max(1) as f64;
    let accuracy = correct as f64 / n;
    let brier_score = if brier_terms.is_empty() { 0.0 } else { brier_terms.as_slice().mean() };
    let auc = binary_auc(&probabilities, &positives);

    let per_class = [
        confusion.precision_recall_f1(0),
        confusion.precision_recall_f1(1),
        confusion.precision_recall_f1(2),
    ];
    let macro_precision = per_class.iter().map(|(p, _, _)| p).sum::<f64>() / 3.0;
    let macro_recall = per_class.iter().map(|(_, r, _)| r).sum::<f64>() / 3.0;
    let macro_f1 = per_class.iter().map(|(_, _, f)| f).sum::<f64>() / 3.0;

    Evaluation {
        metrics: ModelMetrics {
            accuracy,
            precision: macro_precision,
            recall: macro_recall,
            f1: macro_f1,
            brier_score,
            auc,
            sample_count: rows.len() as u64,
        },
        confusion,
        per_class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{DataMode, Horizon, Symbol};

    fn artifact() -> ModelArtifact {
        ModelArtifact {
            feature_names: vec!["rsi_14".to_string()],
            weights: vec![1.0],
            bias: -0.5,
            feature_means: vec![0.0],
            feature_stdevs: vec![1.0],
        }
    }

    fn row(feature_value: f64, label: Direction) -> DatasetRow {
        DatasetRow {
            symbol: Symbol::new("BTCUSDT"),
            horizon: Horizon::H1,
            t0: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            features: vec![("rsi_14".to_string(), feature_value)],
            label,
            return_pct: 0.0,
            data_mode: DataMode::Live,
        }
    }

    #[test]
    fn perfect_separation_yields_high_accuracy() {
        let rows = vec![
            row(5.0, Direction::Win),
            row(5.0, Direction::Win),
            row(-5.0, Direction::Loss),
            row(-5.0, Direction::Loss),
        ];
        let eval = evaluate(&artifact(), &rows, 0.6, 0.4);
        assert!(eval.metrics.accuracy >= 0.5);
        assert_eq!(eval.metrics.sample_count, 4);
    }

    #[test]
    fn auc_is_none_when_only_one_class_present() {
        let rows = vec![row(5.0, Direction::Win), row(6.0, Direction::Win)];
        let eval = evaluate(&artifact(), &rows, 0.6, 0.4);
        assert!(eval.metrics.auc.is_none());
    }
}
