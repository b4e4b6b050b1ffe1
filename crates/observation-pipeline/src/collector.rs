use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use core_types::{
    CandleSet, DataMode, Observation, ObservationIndicatorMeta, ObservationSource, ObservationSourceMeta,
    IndicatorInput, MarketSnapshot, Symbol, Timeframe,
};
use observation_store::ObservationStore;
use provider_core::SymbolResolver;
use tokio::time::MissedTickBehavior;

use crate::regime;
use crate::runner;

const DEFAULT_CANDLE_LIMIT: u32 = 100;
const DEFAULT_ORDER_BOOK_DEPTH: u32 = 20;
const DEFAULT_TRADE_LIMIT: u32 = 200;
const MAX_PER_SYMBOL_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub symbols: Vec<Symbol>,
    pub interval: Duration,
    pub inter_symbol_delay: Duration,
    pub candle_limit: u32,
    pub order_book_depth: u32,
    pub trade_limit: u32,
}

impl CollectorConfig {
    pub fn new(symbols: Vec<Symbol>, interval: Duration) -> Self {
        Self {
            symbols,
            interval,
            inter_symbol_delay: Duration::from_millis(250),
            candle_limit: DEFAULT_CANDLE_LIMIT,
            order_book_depth: DEFAULT_ORDER_BOOK_DEPTH,
            trade_limit: DEFAULT_TRADE_LIMIT,
        }
    }
}

/// Running success/error counts for one collector instance. Reset only by
/// process restart — there is no persistent metrics store per C5.
#[derive(Debug, Default)]
pub struct CollectorCounters {
    pub successes: AtomicU64,
    pub errors: AtomicU64,
    pub skipped_ticks: AtomicU64,
}

impl CollectorCounters {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.successes.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
            self.skipped_ticks.load(Ordering::Relaxed),
        )
    }
}

/// Periodic per-symbol collection loop. At most one pass runs at a time;
/// a tick that fires while a pass is still in flight is dropped rather than
/// queued, per C5's serialization rule.
pub struct Collector {
    resolver: Arc<SymbolResolver>,
    store: Arc<ObservationStore>,
    config: CollectorConfig,
    pass_lock: tokio::sync::Mutex<()>,
    counters: CollectorCounters,
}

impl Collector {
    pub fn new(resolver: Arc<SymbolResolver>, store: Arc<ObservationStore>, config: CollectorConfig) -> Self {
        Self {
            resolver,
            store,
            config,
            pass_lock: tokio::sync::Mutex::new(()),
            counters: CollectorCounters::default(),
        }
    }

    pub fn counters(&self) -> &CollectorCounters {
        &self.counters
    }

    /// Drives the periodic loop until the caller drops/aborts the task.
    pub async fn run_forever(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.clone().try_run_pass().await;
        }
    }

    /// Attempts one collection pass; no-ops (recording a skip) if a pass is
    /// already in flight.
    pub async fn try_run_pass(self: Arc<Self>) {
        match self.pass_lock.try_lock() {
            Ok(_guard) => self.run_pass().await,
            Err(_) => {
                self.counters.skipped_ticks.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("collection pass already in flight, dropping tick");
            }
        }
    }

    async fn run_pass(&self) {
        for symbol in &self.config.symbols {
            self.collect_with_retry(symbol).await;
            tokio::time::sleep(self.config.inter_symbol_delay).await;
        }
    }

    async fn collect_with_retry(&self, symbol: &Symbol) {
        let mut attempt = 0;
        loop {
            match self.collect_one(symbol).await {
                Ok(()) => {
                    self.counters.successes.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(err) => {
                    attempt += 1;
                    if attempt > MAX_PER_SYMBOL_RETRIES {
                        self.counters.errors.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(%symbol, %err, "observation collection failed after retries");
                        return;
                    }
                    tracing::debug!(%symbol, %err, attempt, "retrying observation collection");
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
            }
        }
    }

    async fn collect_one(&self, symbol: &Symbol) -> Result<(), String> {
        let entry = self.resolver.resolve(symbol).await;
        let provider = &entry.provider;

        let mut missing = Vec::new();

        let last_price = provider
            .get_last_price(symbol)
            .await
            .map_err(|e| format!("last_price: {e}"))?;

        let order_book = match provider.get_order_book(symbol, self.config.order_book_depth).await {
            Ok(ob) => ob,
            Err(e) => {
                tracing::debug!(%symbol, %e, "order book fetch failed");
                None
            }
        };
        let (best_bid, best_ask) = order_book
            .as_ref()
            .map(|ob| (ob.best_bid(), ob.best_ask()))
            .unwrap_or((None, None));

        let candles = match provider.get_candles(symbol, Timeframe::M1, self.config.candle_limit).await {
            Ok(c) if !c.is_empty() => c,
            Ok(_) => {
                missing.push("candles".to_string());
                Vec::new()
            }
            Err(e) => {
                tracing::debug!(%symbol, %e, "candle fetch failed");
                missing.push("candles".to_string());
                Vec::new()
            }
        };

        let trades = match provider.get_trades(symbol, self.config.trade_limit).await {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(%symbol, %e, "trade fetch failed");
                None
            }
        };

        let open_interest = match provider.get_open_interest(symbol).await {
            Ok(oi) => oi,
            Err(e) => {
                tracing::debug!(%symbol, %e, "open interest fetch failed");
                None
            }
        };

        let funding = match provider.get_funding(symbol).await {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(%symbol, %e, "funding fetch failed");
                None
            }
        };

        let liquidations = match provider.get_liquidations(symbol).await {
            Ok(l) => l,
            Err(e) => {
                tracing::debug!(%symbol, %e, "liquidation fetch failed");
                None
            }
        };

        let candle_set = if candles.is_empty() {
            None
        } else {
            let mut by_timeframe = std::collections::HashMap::new();
            by_timeframe.insert(Timeframe::M1.as_str().to_string(), candles.clone());
            Some(CandleSet { by_timeframe })
        };

        let snapshot = MarketSnapshot {
            symbol: symbol.clone(),
            provider_id: provider.id().to_string(),
            timestamp: Utc::now(),
            last_price,
            mark_price: None,
            index_price: None,
            best_bid,
            best_ask,
            day: None,
            order_book,
            trades,
            open_interest,
            funding,
            liquidations,
            candles: candle_set,
        };

        if !snapshot.is_sufficient() {
            return Err("snapshot failed sufficiency check".to_string());
        }
        missing.extend(snapshot.missing_fields());

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let input = IndicatorInput {
            symbol,
            snapshot: &snapshot,
            closes: &closes,
            candles: &candles,
        };

        let (indicators, mut indicator_meta) = runner::build_indicator_snapshot(&input, ObservationSource::Polling);
        indicator_meta.source = ObservationSource::Polling;
        let regime_label = regime::classify(&indicators);
        let aggregates = regime::compute_aggregates(&indicators);

        let observation = Observation {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.clone(),
            timestamp: snapshot.timestamp,
            last_price: snapshot.last_price,
            mark_price: snapshot.mark_price,
            best_bid: snapshot.best_bid,
            best_ask: snapshot.best_ask,
            bar: None,
            indicators,
            regime: Some(regime_label),
            liquidation_cascade: aggregates.liquidation_cascade,
            patterns: Vec::new(),
            source_meta: ObservationSourceMeta {
                providers_used: vec![provider.id().to_string()],
                missing,
                data_mode: DataMode::Live,
            },
            indicator_meta,
        };

        self.store.append(&observation).await.map_err(|e| format!("store append: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let counters = CollectorCounters::default();
        assert_eq!(counters.snapshot(), (0, 0, 0));
    }

    #[test]
    fn default_config_has_sane_fetch_sizes() {
        let cfg = CollectorConfig::new(vec![Symbol::new("BTCUSDT")], Duration::from_secs(300));
        assert_eq!(cfg.candle_limit, DEFAULT_CANDLE_LIMIT);
        assert_eq!(cfg.order_book_depth, DEFAULT_ORDER_BOOK_DEPTH);
        assert_eq!(cfg.trade_limit, DEFAULT_TRADE_LIMIT);
    }
}
