use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicator::IndicatorValue;
use crate::symbol::Symbol;

/// Whether an observation was produced by the live collector or reconstructed
/// during a historical backfill run. Rows of both modes share a table;
/// callers filter on this field when it matters to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    Live,
    Backfill,
}

/// Which collection path produced an observation. Distinct from `DataMode`:
/// a replayed fixture is still conceptually "live" data, just re-fed rather
/// than polled fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationSource {
    Polling,
    Replay,
    Backfill,
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Closed-set market regime classification (§4.7). `Neutral` is the
/// fallback used whenever the classifier lacks the required inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeType {
    TrendingUp,
    TrendingDown,
    Range,
    Chaotic,
    Transition,
    Crisis,
    Accumulation,
    Neutral,
}

impl RegimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeType::TrendingUp => "trending_up",
            RegimeType::TrendingDown => "trending_down",
            RegimeType::Range => "range",
            RegimeType::Chaotic => "chaotic",
            RegimeType::Transition => "transition",
            RegimeType::Crisis => "crisis",
            RegimeType::Accumulation => "accumulation",
            RegimeType::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegimeLabel {
    pub regime_type: RegimeType,
    pub confidence: f64,
}

impl RegimeLabel {
    pub fn neutral() -> Self {
        Self {
            regime_type: RegimeType::Neutral,
            confidence: 0.5,
        }
    }
}

/// Which sub-snapshots were missing when this observation was built, and
/// which provider(s) supplied the data that is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationSourceMeta {
    pub providers_used: Vec<String>,
    pub missing: Vec<String>,
    pub data_mode: DataMode,
}

impl Default for DataMode {
    fn default() -> Self {
        DataMode::Live
    }
}

/// Quality metadata for the indicator snapshot: how many of the expected
/// catalog entries were produced, which ids were skipped, and which
/// collection path they came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationIndicatorMeta {
    pub completeness: f64,
    pub count: usize,
    pub missing_ids: Vec<String>,
    pub source: ObservationSource,
}

/// The durable, append-only unit written by the collector: a point-in-time
/// market snapshot reduced to price/volume facts plus the indicator values
/// and regime computed from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,

    pub last_price: f64,
    pub mark_price: Option<f64>,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub bar: Option<OhlcvBar>,

    pub indicators: HashMap<String, IndicatorValue>,
    pub regime: Option<RegimeLabel>,
    pub liquidation_cascade: bool,
    pub patterns: Vec<String>,

    pub source_meta: ObservationSourceMeta,
    pub indicator_meta: ObservationIndicatorMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_meta_defaults_to_live_with_no_gaps() {
        let meta = ObservationSourceMeta::default();
        assert!(meta.missing.is_empty());
        assert_eq!(meta.data_mode, DataMode::Live);
    }

    #[test]
    fn neutral_regime_has_fixed_confidence() {
        let label = RegimeLabel::neutral();
        assert_eq!(label.regime_type, RegimeType::Neutral);
        assert_eq!(label.confidence, 0.5);
    }
}
