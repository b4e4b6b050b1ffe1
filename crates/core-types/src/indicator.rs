use serde::{Deserialize, Serialize};

use crate::snapshot::{Candle, MarketSnapshot};
use crate::symbol::Symbol;

/// Closed set of indicator families. A calculator declares its category up
/// front; the catalog never infers it from output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndicatorCategory {
    PriceStructure,
    Momentum,
    Volume,
    OrderBook,
    Positioning,
    WhalePositioning,
}

impl IndicatorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorCategory::PriceStructure => "price-structure",
            IndicatorCategory::Momentum => "momentum",
            IndicatorCategory::Volume => "volume",
            IndicatorCategory::OrderBook => "order-book",
            IndicatorCategory::Positioning => "positioning",
            IndicatorCategory::WhalePositioning => "whale-positioning",
        }
    }
}

/// What a calculator is handed: the current snapshot, the closing-price
/// series it was derived from, and any prior candles needed for lookback.
/// Calculators never reach past this struct for data.
#[derive(Debug, Clone)]
pub struct IndicatorInput<'a> {
    pub symbol: &'a Symbol,
    pub snapshot: &'a MarketSnapshot,
    pub closes: &'a [f64],
    pub candles: &'a [Candle],
}

/// Where a calculated value came from, for provenance in stored observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorSource {
    Calculated,
    /// Passed through verbatim from provider data (e.g. funding rate).
    Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorMeta {
    pub name: String,
    pub category: IndicatorCategory,
    pub source: IndicatorSource,
}

/// Output of one calculator run. `normalized` holds a value rescaled to a
/// comparable range (typically [-1, 1] or [0, 1]) when the calculator
/// defines one; raw-only indicators leave it `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorValue {
    pub meta: IndicatorMeta,
    pub value: f64,
    pub normalized: Option<f64>,
}

impl IndicatorValue {
    pub fn new(name: impl Into<String>, category: IndicatorCategory, value: f64) -> Self {
        Self {
            meta: IndicatorMeta {
                name: name.into(),
                category,
                source: IndicatorSource::Calculated,
            },
            value,
            normalized: None,
        }
    }

    pub fn with_normalized(mut self, normalized: f64) -> Self {
        self.normalized = Some(normalized);
        self
    }

    pub fn passthrough(name: impl Into<String>, category: IndicatorCategory, value: f64) -> Self {
        Self {
            meta: IndicatorMeta {
                name: name.into(),
                category,
                source: IndicatorSource::Passthrough,
            },
            value,
            normalized: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_strings_are_stable() {
        assert_eq!(IndicatorCategory::WhalePositioning.as_str(), "whale-positioning");
        assert_eq!(IndicatorCategory::OrderBook.as_str(), "order-book");
    }

    #[test]
    fn builder_sets_normalized() {
        let v = IndicatorValue::new("rsi_14", IndicatorCategory::Momentum, 71.2).with_normalized(0.71);
        assert_eq!(v.normalized, Some(0.71));
        assert_eq!(v.meta.source, IndicatorSource::Calculated);
    }
}
