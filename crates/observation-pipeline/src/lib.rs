pub mod catalog;
pub mod collector;
pub mod math;
pub mod regime;
pub mod runner;

pub use collector::{Collector, CollectorConfig, CollectorCounters};
pub use regime::{compute_aggregates, classify, RegimeAggregates};
pub use runner::build_indicator_snapshot;
