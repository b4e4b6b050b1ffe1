use crate::error::{TrainerError, TrainerResult};

/// Hyperparameters and bookkeeping knobs for one training run. Defaults
/// mirror the documented 70/15/15 split, fixed seed, and 0.6/0.4 decision
/// thresholds.
#[derive(Debug, Clone, Copy)]
pub struct TrainingConfig {
    pub train_ratio: f64,
    pub validation_ratio: f64,
    pub test_ratio: f64,
    pub learning_rate: f64,
    pub l2: f64,
    pub max_epochs: u32,
    pub early_stop_patience: u32,
    pub seed: u64,
    pub win_threshold: f64,
    pub loss_threshold: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.70,
            validation_ratio: 0.15,
            test_ratio: 0.15,
            learning_rate: 0.05,
            l2: 0.001,
            max_epochs: 500,
            early_stop_patience: 20,
            seed: 42,
            win_threshold: 0.6,
            loss_threshold: 0.4,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> TrainerResult<()> {
        let ratio_sum = self.train_ratio + self.validation_ratio + self.test_ratio;
        if (ratio_sum - 1.0).abs() > 1e-6 {
            return Err(TrainerError::InvalidConfig(format!(
                "split ratios must sum to 1.0, got {ratio_sum}"
            )));
        }
        if self.train_ratio <= 0.0 || self.validation_ratio <= 0.0 || self.test_ratio <= 0.0 {
            return Err(TrainerError::InvalidConfig(
                "split ratios must all be positive".to_string(),
            ));
        }
        if self.max_epochs == 0 {
            return Err(TrainerError::InvalidConfig("max_epochs must be > 0".to_string()));
        }
        if self.win_threshold <= self.loss_threshold {
            return Err(TrainerError::InvalidConfig(
                "win_threshold must be greater than loss_threshold".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        TrainingConfig::default().validate().unwrap();
    }

    #[test]
    fn ratios_not_summing_to_one_is_rejected() {
        let config = TrainingConfig {
            train_ratio: 0.5,
            validation_ratio: 0.2,
            test_ratio: 0.2,
            ..TrainingConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
