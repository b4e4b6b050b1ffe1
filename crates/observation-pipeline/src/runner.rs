use std::collections::HashMap;

use core_types::{IndicatorInput, IndicatorValue, ObservationIndicatorMeta, ObservationSource};
use rayon::prelude::*;

use crate::catalog::{self, Calculator};

/// Run every registered calculator in isolation and fold the results into
/// an indicator map plus completeness metadata. A calculator that returns
/// `None` (missing inputs) or a non-finite value never fails the pass —
/// it is simply absent from the map and recorded in `missing_ids`.
pub fn build_indicator_snapshot(
    input: &IndicatorInput,
    source: ObservationSource,
) -> (HashMap<String, IndicatorValue>, ObservationIndicatorMeta) {
    let calculators = catalog::catalog();
    let expected = calculators.len();

    let results: Vec<(&'static str, Option<IndicatorValue>)> = calculators
        .par_iter()
        .map(|calc: &Calculator| (calc.id, catalog::run_one(calc, input)))
        .collect();

    let mut values = HashMap::with_capacity(expected);
    let mut missing_ids = Vec::new();

    for (id, value) in results {
        match value {
            Some(v) => {
                values.insert(id.to_string(), v);
            }
            None => missing_ids.push(id.to_string()),
        }
    }

    let completeness = if expected == 0 { 0.0 } else { values.len() as f64 / expected as f64 };

    if completeness == 0.0 {
        tracing::error!(symbol = %input.symbol, "indicator catalog produced zero values");
    } else if completeness < 0.5 {
        tracing::warn!(symbol = %input.symbol, completeness, "indicator catalog below 50% completeness");
    }

    let meta = ObservationIndicatorMeta {
        completeness,
        count: values.len(),
        missing_ids,
        source,
    };

    (values, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{Candle, MarketSnapshot, Symbol};

    fn sparse_snapshot() -> MarketSnapshot {
        MarketSnapshot {
            symbol: Symbol::new("BTCUSDT"),
            provider_id: "mock".into(),
            timestamp: Utc::now(),
            last_price: 100.0,
            mark_price: None,
            index_price: None,
            best_bid: Some(99.9),
            best_ask: Some(100.1),
            day: None,
            order_book: None,
            trades: None,
            open_interest: None,
            funding: None,
            liquidations: None,
            candles: None,
        }
    }

    #[test]
    fn determinism_same_input_same_output() {
        let snapshot = sparse_snapshot();
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.1).collect();
        let candles: Vec<Candle> = Vec::new();
        let input = IndicatorInput {
            symbol: &snapshot.symbol,
            snapshot: &snapshot,
            closes: &closes,
            candles: &candles,
        };

        let (first, first_meta) = build_indicator_snapshot(&input, ObservationSource::Polling);
        let (second, second_meta) = build_indicator_snapshot(&input, ObservationSource::Polling);

        assert_eq!(first.len(), second.len());
        assert_eq!(first_meta.completeness, second_meta.completeness);
        for (id, value) in &first {
            assert_eq!(value.value, second[id].value);
        }
    }

    #[test]
    fn missing_order_book_data_degrades_gracefully_not_fatally() {
        let snapshot = sparse_snapshot();
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.1).collect();
        let candles: Vec<Candle> = Vec::new();
        let input = IndicatorInput {
            symbol: &snapshot.symbol,
            snapshot: &snapshot,
            closes: &closes,
            candles: &candles,
        };

        let (values, meta) = build_indicator_snapshot(&input, ObservationSource::Polling);
        assert!(meta.missing_ids.contains(&"book_imbalance".to_string()));
        assert!(values.contains_key("rsi_14"));
        assert!(meta.completeness > 0.0);
    }
}
