use core_types::{Horizon, Symbol, Timeframe};

pub const MIN_DAYS: u32 = 1;
pub const MAX_DAYS: u32 = 30;
pub const WARMUP_BARS: usize = 50;
pub const MAX_CHUNK_BARS: u32 = 500;

/// Defines one historical ingestion run. `days` is validated against
/// `[MIN_DAYS, MAX_DAYS]` at construction, not deep inside the engine.
#[derive(Debug, Clone)]
pub struct BackfillRunConfig {
    pub symbols: Vec<Symbol>,
    pub days: u32,
    pub timeframe: Timeframe,
    pub provider_id: Option<String>,
    pub horizon: Horizon,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct BackfillConfigError(pub String);

impl std::fmt::Display for BackfillConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for BackfillConfigError {}

impl BackfillRunConfig {
    pub fn new(
        symbols: Vec<Symbol>,
        days: u32,
        timeframe: Timeframe,
        provider_id: Option<String>,
        horizon: Horizon,
        dry_run: bool,
    ) -> Result<Self, BackfillConfigError> {
        if !(MIN_DAYS..=MAX_DAYS).contains(&days) {
            return Err(BackfillConfigError(format!(
                "days must be within [{MIN_DAYS}, {MAX_DAYS}], got {days}"
            )));
        }
        if !matches!(timeframe, Timeframe::M1 | Timeframe::M5 | Timeframe::M15) {
            return Err(BackfillConfigError("timeframe must be one of 1m/5m/15m".to_string()));
        }
        if symbols.is_empty() {
            return Err(BackfillConfigError("symbols must not be empty".to_string()));
        }

        Ok(Self { symbols, days, timeframe, provider_id, horizon, dry_run })
    }

    pub fn total_bars_requested(&self) -> u64 {
        let bars_per_day = (24 * 60 * 60_000) / self.timeframe.to_millis();
        bars_per_day as u64 * self.days as u64
    }
}
