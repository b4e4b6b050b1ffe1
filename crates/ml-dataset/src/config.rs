use chrono::Duration;

/// Knobs for the outcome labeler. Kept distinct from any model-inference
/// threshold (winThreshold/lossThreshold on a `Model`'s `ModelThresholds`):
/// this `epsilon` gates a realized return percentage, not a predicted
/// probability.
#[derive(Debug, Clone, Copy)]
pub struct LabelConfig {
    pub epsilon: f64,
    pub stress_escalation_threshold: f64,
    pub volatility_spike_threshold: f64,
    pub t1_tolerance: Duration,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.003,
            stress_escalation_threshold: 0.20,
            volatility_spike_threshold: 0.25,
            t1_tolerance: Duration::minutes(5),
        }
    }
}

/// Knobs for the dataset builder.
#[derive(Debug, Clone, Copy)]
pub struct DatasetConfig {
    pub min_features: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self { min_features: 8 }
    }
}
