use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// One price level on either side of the book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

/// Order book sub-snapshot. Bids are sorted descending by price, asks
/// ascending. Cumulative depths and imbalance are derived once at
/// construction so downstream indicator calculators don't re-walk the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub cumulative_bid_depth: f64,
    pub cumulative_ask_depth: f64,
    /// (bid_depth - ask_depth) / (bid_depth + ask_depth), in [-1, 1].
    pub imbalance: f64,
}

impl OrderBookSnapshot {
    pub fn new(mut bids: Vec<BookLevel>, mut asks: Vec<BookLevel>) -> Self {
        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));

        let bid_depth: f64 = bids.iter().map(|l| l.size).sum();
        let ask_depth: f64 = asks.iter().map(|l| l.size).sum();
        let total = bid_depth + ask_depth;
        let imbalance = if total > 0.0 {
            (bid_depth - ask_depth) / total
        } else {
            0.0
        };

        Self {
            bids,
            asks,
            cumulative_bid_depth: bid_depth,
            cumulative_ask_depth: ask_depth,
            imbalance,
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeTick {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
    pub is_buyer_maker: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenInterestSnapshot {
    pub open_interest: f64,
    pub open_interest_usd: f64,
    /// Change vs the previous observed snapshot, when known.
    pub delta: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FundingSnapshot {
    pub rate: f64,
    pub next_funding_time: DateTime<Utc>,
    pub interval_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub timestamp: DateTime<Utc>,
    pub side: LiquidationSide,
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationSnapshot {
    pub events: Vec<LiquidationEvent>,
    pub total_long_usd: f64,
    pub total_short_usd: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    pub fn to_millis(self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M5 => 5 * 60_000,
            Timeframe::M15 => 15 * 60_000,
            Timeframe::H1 => 60 * 60_000,
            Timeframe::H4 => 4 * 60 * 60_000,
            Timeframe::D1 => 24 * 60 * 60_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandleSet {
    pub by_timeframe: std::collections::HashMap<String, Vec<Candle>>,
}

/// 24h rolling aggregates as reported by the venue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DayAggregates {
    pub volume_base: f64,
    pub volume_quote: f64,
    pub price_change_percent: f64,
    pub high: f64,
    pub low: f64,
}

/// A normalized snapshot of market state for (symbol, provider, timestamp).
/// Every sub-snapshot is independently optional; absence is recorded by the
/// collector in `sourceMeta.missing`, never as an error here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: Symbol,
    pub provider_id: String,
    pub timestamp: DateTime<Utc>,

    pub last_price: f64,
    pub mark_price: Option<f64>,
    pub index_price: Option<f64>,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub day: Option<DayAggregates>,

    pub order_book: Option<OrderBookSnapshot>,
    pub trades: Option<Vec<TradeTick>>,
    pub open_interest: Option<OpenInterestSnapshot>,
    pub funding: Option<FundingSnapshot>,
    pub liquidations: Option<LiquidationSnapshot>,
    pub candles: Option<CandleSet>,
}

impl MarketSnapshot {
    /// Quote-currency spread derived from best bid/ask, when both are known.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) if bid > 0.0 => Some(ask - bid),
            _ => None,
        }
    }

    /// Mandatory-fields sufficiency gate: last price plus a best bid/ask
    /// pair must be present for the snapshot to be usable downstream.
    pub fn is_sufficient(&self) -> bool {
        self.last_price.is_finite() && self.last_price > 0.0 && self.best_bid.is_some() && self.best_ask.is_some()
    }

    /// Names of sub-snapshots that are absent, for `sourceMeta.missing`.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.order_book.is_none() {
            missing.push("orderBook".to_string());
        }
        if self.trades.is_none() {
            missing.push("trades".to_string());
        }
        if self.open_interest.is_none() {
            missing.push("openInterest".to_string());
        }
        if self.funding.is_none() {
            missing.push("funding".to_string());
        }
        if self.liquidations.is_none() {
            missing.push("liquidations".to_string());
        }
        if self.candles.is_none() {
            missing.push("candles".to_string());
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_book_imbalance_sign() {
        let book = OrderBookSnapshot::new(
            vec![BookLevel { price: 100.0, size: 10.0 }],
            vec![BookLevel { price: 101.0, size: 2.0 }],
        );
        assert!(book.imbalance > 0.0, "more bid depth should be positive imbalance");
        assert_eq!(book.best_bid(), Some(100.0));
        assert_eq!(book.best_ask(), Some(101.0));
    }

    #[test]
    fn sufficiency_requires_bid_ask() {
        let snap = MarketSnapshot {
            symbol: Symbol::new("BTCUSDT"),
            provider_id: "mock".into(),
            timestamp: Utc::now(),
            last_price: 50_000.0,
            mark_price: None,
            index_price: None,
            best_bid: None,
            best_ask: None,
            day: None,
            order_book: None,
            trades: None,
            open_interest: None,
            funding: None,
            liquidations: None,
            candles: None,
        };
        assert!(!snap.is_sufficient());
        assert!(snap.missing_fields().contains(&"orderBook".to_string()));
    }
}
