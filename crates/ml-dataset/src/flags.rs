use core_types::Observation;
use observation_pipeline::compute_aggregates;

use crate::config::LabelConfig;

/// Derived signals comparing the state of the market at t1 vs t0, used to
/// enrich an outcome beyond its raw realized return.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeFlags {
    pub cascade_occurred: bool,
    pub stress_escalated: bool,
    pub regime_degraded: bool,
    pub volatility_spike: bool,
}

fn is_degraded_regime(label: Option<&core_types::RegimeLabel>) -> bool {
    matches!(
        label.map(|l| l.regime_type),
        Some(core_types::RegimeType::Crisis) | Some(core_types::RegimeType::Chaotic)
    )
}

/// Compare t0 and t1 aggregates against fixed thresholds to derive the
/// outcome flags. Aggregates are recomputed from each observation's own
/// indicator map rather than stored redundantly on the observation.
pub fn derive_flags(t0: &Observation, t1: &Observation, config: &LabelConfig) -> OutcomeFlags {
    let t0_aggregates = compute_aggregates(&t0.indicators);
    let t1_aggregates = compute_aggregates(&t1.indicators);

    OutcomeFlags {
        cascade_occurred: t1.liquidation_cascade && !t0.liquidation_cascade,
        stress_escalated: (t1_aggregates.stress - t0_aggregates.stress) >= config.stress_escalation_threshold,
        regime_degraded: !is_degraded_regime(t0.regime.as_ref()) && is_degraded_regime(t1.regime.as_ref()),
        volatility_spike: (t1_aggregates.normalized_volatility - t0_aggregates.normalized_volatility)
            >= config.volatility_spike_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{
        DataMode, ObservationIndicatorMeta, ObservationSource, ObservationSourceMeta, RegimeLabel, RegimeType, Symbol,
    };
    use std::collections::HashMap;

    fn obs(regime: RegimeType, cascade: bool) -> Observation {
        Observation {
            id: "o".into(),
            symbol: Symbol::new("BTCUSDT"),
            timestamp: Utc::now(),
            last_price: 100.0,
            mark_price: None,
            best_bid: Some(99.0),
            best_ask: Some(101.0),
            bar: None,
            indicators: HashMap::new(),
            regime: Some(RegimeLabel { regime_type: regime, confidence: 0.8 }),
            liquidation_cascade: cascade,
            patterns: vec![],
            source_meta: ObservationSourceMeta {
                providers_used: vec!["mock".into()],
                missing: vec![],
                data_mode: DataMode::Live,
            },
            indicator_meta: ObservationIndicatorMeta {
                completeness: 1.0,
                count: 0,
                missing_ids: vec![],
                source: ObservationSource::Polling,
            },
        }
    }

    #[test]
    fn cascade_flag_requires_transition_into_cascade() {
        let t0 = obs(RegimeType::Range, false);
        let t1 = obs(RegimeType::Range, true);
        let flags = derive_flags(&t0, &t1, &LabelConfig::default());
        assert!(flags.cascade_occurred);
    }

    #[test]
    fn regime_degraded_only_on_transition_into_crisis() {
        let t0 = obs(RegimeType::Range, false);
        let t1 = obs(RegimeType::Crisis, false);
        let flags = derive_flags(&t0, &t1, &LabelConfig::default());
        assert!(flags.regime_degraded);

        let t0b = obs(RegimeType::Crisis, false);
        let t1b = obs(RegimeType::Crisis, false);
        let flags_b = derive_flags(&t0b, &t1b, &LabelConfig::default());
        assert!(!flags_b.regime_degraded, "already-degraded state is not a new transition");
    }
}
