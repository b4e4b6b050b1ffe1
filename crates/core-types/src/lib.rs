pub mod error;
pub mod indicator;
pub mod model;
pub mod observation;
pub mod outcome;
pub mod performance;
pub mod snapshot;
pub mod symbol;

pub use error::CoreError;
pub use indicator::{IndicatorCategory, IndicatorInput, IndicatorMeta, IndicatorSource, IndicatorValue};
pub use model::{
    Algorithm, GuardrailState, LifecycleEvent, LifecycleEventType, Model, ModelArtifact,
    ModelMetrics, ModelRegistryEntry, ModelStatus, ModelThresholds, DriftState,
};
pub use observation::{
    DataMode, Observation, ObservationIndicatorMeta, ObservationSource, ObservationSourceMeta,
    OhlcvBar, RegimeLabel, RegimeType,
};
pub use outcome::{DatasetRow, Direction, Horizon, Outcome};
pub use performance::{
    ConfidenceLevel, DriftSeverity, PerformanceComparison, PerformanceWindow, RollbackDecision,
    RollbackSeverity, TradeOutcome, STANDARD_WINDOW_DAYS,
};
pub use snapshot::{
    BookLevel, Candle, CandleSet, DayAggregates, FundingSnapshot, LiquidationEvent,
    LiquidationSide, LiquidationSnapshot, MarketSnapshot, OpenInterestSnapshot, OrderBookSnapshot,
    Timeframe, TradeTick,
};
pub use symbol::Symbol;
