use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observation::DataMode;
use crate::symbol::Symbol;

/// Forward-looking window an outcome is measured over. Stored as minutes so
/// new horizons can be added without a schema migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Horizon(pub u32);

impl Horizon {
    pub const M15: Horizon = Horizon(15);
    pub const H1: Horizon = Horizon(60);
    pub const H4: Horizon = Horizon(240);
    pub const D1: Horizon = Horizon(1440);

    pub fn minutes(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Win,
    Loss,
    Neutral,
}

/// The realized label for a (symbol, t0, horizon) pair: what actually
/// happened to price between the observation at t0 and the observation
/// nearest t0 + horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub symbol: Symbol,
    pub horizon: Horizon,
    pub t0: DateTime<Utc>,
    pub t0_observation_id: String,
    pub t1_observation_id: String,
    pub t0_price: f64,
    pub t1_price: f64,
    pub return_pct: f64,
    pub direction: Direction,
}

/// One labeled training example: causal features read as of t0, joined to
/// the outcome realized at t0 + horizon. Feature values must never reach
/// past t0 — the dataset builder enforces this, not the trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRow {
    pub symbol: Symbol,
    pub horizon: Horizon,
    pub t0: DateTime<Utc>,
    pub features: Vec<(String, f64)>,
    pub label: Direction,
    pub return_pct: f64,
    pub data_mode: DataMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_constants_are_in_minutes() {
        assert_eq!(Horizon::H1.minutes(), 60);
        assert_eq!(Horizon::D1.minutes(), 1440);
    }
}
