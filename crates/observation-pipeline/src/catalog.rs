use core_types::{IndicatorCategory, IndicatorInput, IndicatorValue};

use crate::math;

/// One entry in the fixed indicator catalog: an id, a category, and a pure
/// function from `IndicatorInput` to a raw value. `normalize` rescales that
/// value into a roughly comparable range when one is meaningful; omitted
/// when the raw value already is (percentages, ratios bounded in [0, 1]).
pub struct Calculator {
    pub id: &'static str,
    pub category: IndicatorCategory,
    pub compute: fn(&IndicatorInput) -> Option<f64>,
    pub normalize: Option<fn(f64) -> f64>,
}

fn clamp_unit(v: f64) -> f64 {
    v.clamp(-1.0, 1.0)
}

fn clamp_zero_one(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

fn sma_20(input: &IndicatorInput) -> Option<f64> {
    math::sma(input.closes, 20)
}

fn ema_20(input: &IndicatorInput) -> Option<f64> {
    math::ema(input.closes, 20)
}

fn bollinger_width_20(input: &IndicatorInput) -> Option<f64> {
    math::bollinger_width(input.closes, 20, 2.0)
}

fn atr_pct_14(input: &IndicatorInput) -> Option<f64> {
    if input.candles.len() < 15 {
        return None;
    }
    let trs: Vec<f64> = input
        .candles
        .windows(2)
        .map(|w| {
            let (prev, cur) = (w[0], w[1]);
            (cur.high - cur.low)
                .max((cur.high - prev.close).abs())
                .max((cur.low - prev.close).abs())
        })
        .collect();
    let window = &trs[trs.len().saturating_sub(14)..];
    let atr = window.iter().sum::<f64>() / window.len() as f64;
    let price = input.candles.last()?.close;
    if price.abs() < f64::EPSILON {
        return None;
    }
    Some(math::finite_or(atr / price * 100.0, 0.0))
}

fn price_position_20(input: &IndicatorInput) -> Option<f64> {
    math::price_position_in_range(input.closes, 20)
}

fn vwap_deviation(input: &IndicatorInput) -> Option<f64> {
    if input.candles.len() < 20 {
        return None;
    }
    let window = &input.candles[input.candles.len() - 20..];
    let (pv_sum, vol_sum) = window.iter().fold((0.0, 0.0), |(pv, v), c| {
        let typical = (c.high + c.low + c.close) / 3.0;
        (pv + typical * c.volume, v + c.volume)
    });
    if vol_sum.abs() < f64::EPSILON {
        return None;
    }
    let vwap = pv_sum / vol_sum;
    let last = window.last()?.close;
    if vwap.abs() < f64::EPSILON {
        return None;
    }
    Some(math::finite_or((last - vwap) / vwap, 0.0))
}

fn rsi_14(input: &IndicatorInput) -> Option<f64> {
    math::rsi(input.closes, 14)
}

fn macd_histogram_12_26_9(input: &IndicatorInput) -> Option<f64> {
    math::macd_histogram(input.closes, 12, 26, 9)
}

fn roc_10(input: &IndicatorInput) -> Option<f64> {
    math::rate_of_change(input.closes, 10)
}

fn stochastic_k_14(input: &IndicatorInput) -> Option<f64> {
    math::stochastic_k(input.closes, 14)
}

fn cci_20(input: &IndicatorInput) -> Option<f64> {
    math::cci(input.closes, 20)
}

fn momentum_10(input: &IndicatorInput) -> Option<f64> {
    math::momentum(input.closes, 10)
}

fn volume_sma_ratio_20(input: &IndicatorInput) -> Option<f64> {
    if input.candles.len() < 20 {
        return None;
    }
    let volumes: Vec<f64> = input.candles.iter().map(|c| c.volume).collect();
    let avg = math::sma(&volumes, 20)?;
    if avg.abs() < f64::EPSILON {
        return None;
    }
    let last = volumes.last()?;
    Some(math::finite_or(last / avg, 1.0))
}

fn on_balance_volume_delta(input: &IndicatorInput) -> Option<f64> {
    if input.candles.len() < 2 {
        return None;
    }
    let mut obv = 0.0;
    for w in input.candles.windows(2) {
        if w[1].close > w[0].close {
            obv += w[1].volume;
        } else if w[1].close < w[0].close {
            obv -= w[1].volume;
        }
    }
    Some(obv)
}

fn taker_buy_ratio(input: &IndicatorInput) -> Option<f64> {
    let trades = input.snapshot.trades.as_ref()?;
    if trades.is_empty() {
        return None;
    }
    let buy_volume: f64 = trades.iter().filter(|t| !t.is_buyer_maker).map(|t| t.size).sum();
    let total: f64 = trades.iter().map(|t| t.size).sum();
    if total.abs() < f64::EPSILON {
        return None;
    }
    Some(math::finite_or(buy_volume / total, 0.5))
}

fn large_trade_ratio(input: &IndicatorInput) -> Option<f64> {
    let trades = input.snapshot.trades.as_ref()?;
    if trades.is_empty() {
        return None;
    }
    let mean_size = trades.iter().map(|t| t.size).sum::<f64>() / trades.len() as f64;
    let threshold = mean_size * 3.0;
    let large = trades.iter().filter(|t| t.size >= threshold).count();
    Some(large as f64 / trades.len() as f64)
}

fn book_imbalance(input: &IndicatorInput) -> Option<f64> {
    Some(input.snapshot.order_book.as_ref()?.imbalance)
}

fn spread_bps(input: &IndicatorInput) -> Option<f64> {
    let spread = input.snapshot.spread()?;
    if input.snapshot.last_price.abs() < f64::EPSILON {
        return None;
    }
    Some(math::finite_or(spread / input.snapshot.last_price * 10_000.0, 0.0))
}

fn cumulative_depth_ratio(input: &IndicatorInput) -> Option<f64> {
    let book = input.snapshot.order_book.as_ref()?;
    let total = book.cumulative_bid_depth + book.cumulative_ask_depth;
    if total.abs() < f64::EPSILON {
        return None;
    }
    Some(book.cumulative_bid_depth / total)
}

fn depth_at_best(input: &IndicatorInput) -> Option<f64> {
    let book = input.snapshot.order_book.as_ref()?;
    let bid = book.bids.first()?.size;
    let ask = book.asks.first()?.size;
    Some(bid + ask)
}

fn funding_rate(input: &IndicatorInput) -> Option<f64> {
    Some(input.snapshot.funding.as_ref()?.rate)
}

fn funding_extremity(input: &IndicatorInput) -> Option<f64> {
    Some(input.snapshot.funding.as_ref()?.rate.abs())
}

fn open_interest_delta_pct(input: &IndicatorInput) -> Option<f64> {
    let oi = input.snapshot.open_interest.as_ref()?;
    let delta = oi.delta?;
    if oi.open_interest.abs() < f64::EPSILON {
        return None;
    }
    Some(math::finite_or(delta / oi.open_interest * 100.0, 0.0))
}

fn oi_to_volume_ratio(input: &IndicatorInput) -> Option<f64> {
    let oi = input.snapshot.open_interest.as_ref()?;
    let day = input.snapshot.day.as_ref()?;
    if day.volume_quote.abs() < f64::EPSILON {
        return None;
    }
    Some(math::finite_or(oi.open_interest_usd / day.volume_quote, 0.0))
}

fn liquidation_long_short_ratio(input: &IndicatorInput) -> Option<f64> {
    let liq = input.snapshot.liquidations.as_ref()?;
    let total = liq.total_long_usd + liq.total_short_usd;
    if total.abs() < f64::EPSILON {
        return None;
    }
    Some((liq.total_long_usd - liq.total_short_usd) / total)
}

fn liquidation_pressure(input: &IndicatorInput) -> Option<f64> {
    let liq = input.snapshot.liquidations.as_ref()?;
    let oi = input.snapshot.open_interest.as_ref()?;
    if oi.open_interest_usd.abs() < f64::EPSILON {
        return None;
    }
    let total_liq = liq.total_long_usd + liq.total_short_usd;
    Some(math::finite_or(total_liq / oi.open_interest_usd, 0.0))
}

fn whale_trade_imbalance(input: &IndicatorInput) -> Option<f64> {
    let trades = input.snapshot.trades.as_ref()?;
    if trades.is_empty() {
        return None;
    }
    let mean_size = trades.iter().map(|t| t.size).sum::<f64>() / trades.len() as f64;
    let threshold = mean_size * 3.0;
    let whales: Vec<_> = trades.iter().filter(|t| t.size >= threshold).collect();
    if whales.is_empty() {
        return None;
    }
    let buy: f64 = whales.iter().filter(|t| !t.is_buyer_maker).map(|t| t.size).sum();
    let sell: f64 = whales.iter().filter(|t| t.is_buyer_maker).map(|t| t.size).sum();
    let total = buy + sell;
    if total.abs() < f64::EPSILON {
        return None;
    }
    Some((buy - sell) / total)
}

fn volatility_20(input: &IndicatorInput) -> Option<f64> {
    if input.closes.len() < 21 {
        return None;
    }
    let window = &input.closes[input.closes.len() - 21..];
    math::stdev(&math::returns(window))
}

fn trend_slope_20(input: &IndicatorInput) -> Option<f64> {
    if input.closes.len() < 20 {
        return None;
    }
    let window = &input.closes[input.closes.len() - 20..];
    let n = window.len() as f64;
    let sum_x: f64 = (0..window.len()).sum::<usize>() as f64;
    let sum_y: f64 = window.iter().sum();
    let sum_xy: f64 = window.iter().enumerate().map(|(i, v)| i as f64 * v).sum();
    let sum_x2: f64 = (0..window.len()).map(|i| (i * i) as f64).sum();
    let denom = n * sum_x2 - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let avg_price = sum_y / n;
    if avg_price.abs() < f64::EPSILON {
        return None;
    }
    Some(math::finite_or(slope / avg_price, 0.0))
}

/// The fixed catalog: every entry registered once at process startup, run
/// in isolation for each observation. Adding an indicator means adding one
/// entry here, never touching the runner.
pub fn catalog() -> Vec<Calculator> {
    vec![
        Calculator { id: "sma_20", category: IndicatorCategory::PriceStructure, compute: sma_20, normalize: None },
        Calculator { id: "ema_20", category: IndicatorCategory::PriceStructure, compute: ema_20, normalize: None },
        Calculator { id: "bollinger_width_20", category: IndicatorCategory::PriceStructure, compute: bollinger_width_20, normalize: None },
        Calculator { id: "atr_pct_14", category: IndicatorCategory::PriceStructure, compute: atr_pct_14, normalize: None },
        Calculator { id: "price_position_20", category: IndicatorCategory::PriceStructure, compute: price_position_20, normalize: Some(clamp_zero_one) },
        Calculator { id: "vwap_deviation", category: IndicatorCategory::PriceStructure, compute: vwap_deviation, normalize: Some(clamp_unit) },
        Calculator { id: "volatility_20", category: IndicatorCategory::PriceStructure, compute: volatility_20, normalize: None },
        Calculator { id: "trend_slope_20", category: IndicatorCategory::PriceStructure, compute: trend_slope_20, normalize: Some(clamp_unit) },
        Calculator { id: "rsi_14", category: IndicatorCategory::Momentum, compute: rsi_14, normalize: Some(|v| clamp_zero_one(v / 100.0)) },
        Calculator { id: "macd_histogram_12_26_9", category: IndicatorCategory::Momentum, compute: macd_histogram_12_26_9, normalize: None },
        Calculator { id: "roc_10", category: IndicatorCategory::Momentum, compute: roc_10, normalize: None },
        Calculator { id: "stochastic_k_14", category: IndicatorCategory::Momentum, compute: stochastic_k_14, normalize: Some(|v| clamp_zero_one(v / 100.0)) },
        Calculator { id: "cci_20", category: IndicatorCategory::Momentum, compute: cci_20, normalize: None },
        Calculator { id: "momentum_10", category: IndicatorCategory::Momentum, compute: momentum_10, normalize: None },
        Calculator { id: "volume_sma_ratio_20", category: IndicatorCategory::Volume, compute: volume_sma_ratio_20, normalize: None },
        Calculator { id: "obv_delta", category: IndicatorCategory::Volume, compute: on_balance_volume_delta, normalize: None },
        Calculator { id: "taker_buy_ratio", category: IndicatorCategory::Volume, compute: taker_buy_ratio, normalize: None },
        Calculator { id: "large_trade_ratio", category: IndicatorCategory::Volume, compute: large_trade_ratio, normalize: None },
        Calculator { id: "book_imbalance", category: IndicatorCategory::OrderBook, compute: book_imbalance, normalize: None },
        Calculator { id: "spread_bps", category: IndicatorCategory::OrderBook, compute: spread_bps, normalize: None },
        Calculator { id: "cumulative_depth_ratio", category: IndicatorCategory::OrderBook, compute: cumulative_depth_ratio, normalize: None },
        Calculator { id: "depth_at_best", category: IndicatorCategory::OrderBook, compute: depth_at_best, normalize: None },
        Calculator { id: "funding_rate", category: IndicatorCategory::Positioning, compute: funding_rate, normalize: None },
        Calculator { id: "funding_extremity", category: IndicatorCategory::Positioning, compute: funding_extremity, normalize: None },
        Calculator { id: "open_interest_delta_pct", category: IndicatorCategory::Positioning, compute: open_interest_delta_pct, normalize: None },
        Calculator { id: "oi_to_volume_ratio", category: IndicatorCategory::Positioning, compute: oi_to_volume_ratio, normalize: None },
        Calculator { id: "liquidation_long_short_ratio", category: IndicatorCategory::WhalePositioning, compute: liquidation_long_short_ratio, normalize: None },
        Calculator { id: "liquidation_pressure", category: IndicatorCategory::WhalePositioning, compute: liquidation_pressure, normalize: None },
        Calculator { id: "whale_trade_imbalance", category: IndicatorCategory::WhalePositioning, compute: whale_trade_imbalance, normalize: None },
    ]
}

pub fn run_one(calc: &Calculator, input: &IndicatorInput) -> Option<IndicatorValue> {
    let raw = (calc.compute)(input)?;
    if !raw.is_finite() {
        return None;
    }
    let value = IndicatorValue::new(calc.id, calc.category, raw);
    Some(match calc.normalize {
        Some(f) => value.with_normalized(f(raw)),
        None => value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_entries_in_every_category() {
        let cats: std::collections::HashSet<_> = catalog().iter().map(|c| c.category.as_str()).collect();
        assert!(cats.contains("price-structure"));
        assert!(cats.contains("momentum"));
        assert!(cats.contains("volume"));
        assert!(cats.contains("order-book"));
        assert!(cats.contains("positioning"));
        assert!(cats.contains("whale-positioning"));
    }
}
