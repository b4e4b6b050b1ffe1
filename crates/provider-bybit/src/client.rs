use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    BookLevel, Candle, FundingSnapshot, LiquidationSnapshot, OpenInterestSnapshot,
    OrderBookSnapshot, Symbol, Timeframe, TradeTick,
};
use provider_core::{
    ExchangeProvider, HealthTracker, ProviderCapabilities, ProviderError, ProviderHealth,
    ProviderResult, RateLimiterRegistry,
};
use reqwest::Client;

use crate::dto::{
    Envelope, InstrumentsResult, KlineResult, OpenInterestResult, OrderBookResult,
    RecentTradeResult, TickersResult,
};
use crate::{BASE_URL, VENUE_ID};

const CATEGORY: &str = "linear";

fn parse_f64(raw: &str, provider: &str) -> ProviderResult<f64> {
    f64::from_str(raw).map_err(|e| ProviderError::Malformed {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

fn bybit_interval(interval: Timeframe) -> &'static str {
    match interval {
        Timeframe::M1 => "1",
        Timeframe::M5 => "5",
        Timeframe::M15 => "15",
        Timeframe::H1 => "60",
        Timeframe::H4 => "240",
        Timeframe::D1 => "D",
    }
}

/// Read-only connector for Bybit's derivatives v5 API, linear (USDT
/// perpetual) category only. Unsigned public endpoints; no order
/// placement, no credentials.
pub struct BybitProvider {
    http: Client,
    base_url: String,
    rate_limiter: Arc<RateLimiterRegistry>,
    tracker: HealthTracker,
    caps: ProviderCapabilities,
}

impl BybitProvider {
    pub fn new(rate_limiter: Arc<RateLimiterRegistry>) -> Self {
        Self::with_base_url(rate_limiter, BASE_URL.to_string())
    }

    pub fn with_base_url(rate_limiter: Arc<RateLimiterRegistry>, base_url: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            base_url,
            rate_limiter,
            tracker: HealthTracker::new(),
            caps: ProviderCapabilities {
                market_types: vec!["perpetual".to_string()],
                supports_order_book: true,
                supports_trades: true,
                supports_open_interest: true,
                supports_funding: true,
                supports_liquidations: false,
                declared_rate_limit_per_minute: 600,
            },
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ProviderResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.get(&url).query(query);

        let response = self
            .rate_limiter
            .schedule(VENUE_ID, || async { request.send().await })
            .await
            .map_err(|e| {
                self.tracker.record_failure(Utc::now());
                ProviderError::Http {
                    provider: VENUE_ID.to_string(),
                    message: e.to_string(),
                }
            })?;

        if response.status().as_u16() == 429 {
            self.rate_limiter.record_rate_limited(VENUE_ID).await;
            self.tracker.record_failure(Utc::now());
            return Err(ProviderError::RateLimited {
                provider: VENUE_ID.to_string(),
            });
        }

        if !response.status().is_success() {
            self.tracker.record_failure(Utc::now());
            return Err(ProviderError::Http {
                provider: VENUE_ID.to_string(),
                message: format!("http {}", response.status()),
            });
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            self.tracker.record_failure(Utc::now());
            ProviderError::Malformed {
                provider: VENUE_ID.to_string(),
                message: e.to_string(),
            }
        })?;

        if envelope.ret_code != 0 {
            self.tracker.record_failure(Utc::now());
            return Err(ProviderError::Http {
                provider: VENUE_ID.to_string(),
                message: format!("retCode {}: {}", envelope.ret_code, envelope.ret_msg),
            });
        }

        self.tracker.record_success(Utc::now());
        Ok(envelope.result)
    }
}

#[async_trait]
impl ExchangeProvider for BybitProvider {
    fn id(&self) -> &str {
        VENUE_ID
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.caps
    }

    fn health(&self) -> ProviderHealth {
        self.tracker.snapshot()
    }

    fn reset_health(&self) {
        self.tracker.reset();
    }

    fn normalize(&self, raw: &str) -> Symbol {
        Symbol::new(raw)
    }

    fn denormalize(&self, symbol: &Symbol) -> String {
        symbol.as_str().to_string()
    }

    async fn list_symbols(&self) -> ProviderResult<Vec<Symbol>> {
        let result: InstrumentsResult = self
            .get("/v5/market/instruments-info", &[("category", CATEGORY.to_string())])
            .await?;

        Ok(result
            .list
            .into_iter()
            .filter(|s| s.status == "Trading")
            .map(|s| Symbol::new(s.symbol))
            .collect())
    }

    async fn get_candles(&self, symbol: &Symbol, interval: Timeframe, limit: u32) -> ProviderResult<Vec<Candle>> {
        let result: KlineResult = self
            .get(
                "/v5/market/kline",
                &[
                    ("category", CATEGORY.to_string()),
                    ("symbol", self.denormalize(symbol)),
                    ("interval", bybit_interval(interval).to_string()),
                    ("limit", limit.min(1000).to_string()),
                ],
            )
            .await?;

        let mut candles = result
            .list
            .into_iter()
            .map(|row| {
                let open_time_ms: i64 = row[0].parse().map_err(|_| ProviderError::Malformed {
                    provider: VENUE_ID.to_string(),
                    message: "bad open time".to_string(),
                })?;
                Ok(Candle {
                    open_time: DateTime::from_timestamp_millis(open_time_ms).unwrap_or_else(Utc::now),
                    open: parse_f64(&row[1], VENUE_ID)?,
                    high: parse_f64(&row[2], VENUE_ID)?,
                    low: parse_f64(&row[3], VENUE_ID)?,
                    close: parse_f64(&row[4], VENUE_ID)?,
                    volume: parse_f64(&row[5], VENUE_ID)?,
                })
            })
            .collect::<ProviderResult<Vec<_>>>()?;

        // Bybit returns most-recent-first; normalize to chronological order.
        candles.reverse();
        Ok(candles)
    }

    async fn get_order_book(&self, symbol: &Symbol, depth: u32) -> ProviderResult<Option<OrderBookSnapshot>> {
        let result: OrderBookResult = self
            .get(
                "/v5/market/orderbook",
                &[
                    ("category", CATEGORY.to_string()),
                    ("symbol", self.denormalize(symbol)),
                    ("limit", depth.clamp(1, 200).to_string()),
                ],
            )
            .await?;

        let to_levels = |raw: Vec<Vec<String>>| -> ProviderResult<Vec<BookLevel>> {
            raw.into_iter()
                .map(|level| {
                    Ok(BookLevel {
                        price: parse_f64(&level[0], VENUE_ID)?,
                        size: parse_f64(&level[1], VENUE_ID)?,
                    })
                })
                .collect()
        };

        Ok(Some(OrderBookSnapshot::new(to_levels(result.b)?, to_levels(result.a)?)))
    }

    async fn get_trades(&self, symbol: &Symbol, limit: u32) -> ProviderResult<Option<Vec<TradeTick>>> {
        let result: RecentTradeResult = self
            .get(
                "/v5/market/recent-trade",
                &[
                    ("category", CATEGORY.to_string()),
                    ("symbol", self.denormalize(symbol)),
                    ("limit", limit.min(1000).to_string()),
                ],
            )
            .await?;

        let ticks = result
            .list
            .into_iter()
            .map(|t| {
                let time_ms: i64 = t.time.parse().map_err(|_| ProviderError::Malformed {
                    provider: VENUE_ID.to_string(),
                    message: "bad trade time".to_string(),
                })?;
                Ok(TradeTick {
                    timestamp: DateTime::from_timestamp_millis(time_ms).unwrap_or_else(Utc::now),
                    price: parse_f64(&t.price, VENUE_ID)?,
                    size: parse_f64(&t.size, VENUE_ID)?,
                    is_buyer_maker: t.side.eq_ignore_ascii_case("Sell"),
                })
            })
            .collect::<ProviderResult<Vec<_>>>()?;

        Ok(Some(ticks))
    }

    async fn get_open_interest(&self, symbol: &Symbol) -> ProviderResult<Option<OpenInterestSnapshot>> {
        let result: OpenInterestResult = self
            .get(
                "/v5/market/open-interest",
                &[
                    ("category", CATEGORY.to_string()),
                    ("symbol", self.denormalize(symbol)),
                    ("intervalTime", "5min".to_string()),
                ],
            )
            .await?;

        let latest = result.list.first().ok_or_else(|| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: "empty open interest list".to_string(),
        })?;

        let open_interest = parse_f64(&latest.open_interest, VENUE_ID)?;
        let last_price = self.get_last_price(symbol).await.unwrap_or(0.0);

        Ok(Some(OpenInterestSnapshot {
            open_interest,
            open_interest_usd: open_interest * last_price,
            delta: None,
        }))
    }

    async fn get_funding(&self, symbol: &Symbol) -> ProviderResult<Option<FundingSnapshot>> {
        let result: TickersResult = self
            .get(
                "/v5/market/tickers",
                &[("category", CATEGORY.to_string()), ("symbol", self.denormalize(symbol))],
            )
            .await?;

        let ticker = result.list.first().ok_or_else(|| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: "empty ticker list".to_string(),
        })?;

        let next_funding_ms: i64 = ticker.next_funding_time.parse().unwrap_or(0);

        Ok(Some(FundingSnapshot {
            rate: parse_f64(&ticker.funding_rate, VENUE_ID)?,
            next_funding_time: DateTime::from_timestamp_millis(next_funding_ms).unwrap_or_else(Utc::now),
            interval_hours: 8,
        }))
    }

    async fn get_liquidations(&self, _symbol: &Symbol) -> ProviderResult<Option<LiquidationSnapshot>> {
        // Public liquidation history on v5 is websocket-only; not reachable
        // from this REST connector.
        Ok(None)
    }

    async fn get_last_price(&self, symbol: &Symbol) -> ProviderResult<f64> {
        let result: TickersResult = self
            .get(
                "/v5/market/tickers",
                &[("category", CATEGORY.to_string()), ("symbol", self.denormalize(symbol))],
            )
            .await?;

        let ticker = result.list.first().ok_or_else(|| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: "empty ticker list".to_string(),
        })?;

        parse_f64(&ticker.last_price, VENUE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_mapping_covers_all_timeframes() {
        assert_eq!(bybit_interval(Timeframe::M1), "1");
        assert_eq!(bybit_interval(Timeframe::D1), "D");
    }
}
