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
    DepthResponse, ExchangeInfo, Kline, OpenInterestResponse, PremiumIndexResponse,
    TickerPriceResponse, TradeResponse,
};
use crate::{BASE_URL, VENUE_ID};

fn parse_f64(raw: &str, provider: &str) -> ProviderResult<f64> {
    f64::from_str(raw).map_err(|e| ProviderError::Malformed {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

/// Read-only connector for Binance USDⓈ-M perpetual futures. All requests
/// are unsigned public endpoints; no order placement, no credentials.
pub struct BinanceProvider {
    http: Client,
    base_url: String,
    rate_limiter: Arc<RateLimiterRegistry>,
    tracker: HealthTracker,
    caps: ProviderCapabilities,
}

impl BinanceProvider {
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
                declared_rate_limit_per_minute: 2400,
            },
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> ProviderResult<reqwest::Response> {
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

        self.tracker.record_success(Utc::now());
        Ok(response)
    }
}

#[async_trait]
impl ExchangeProvider for BinanceProvider {
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
        let response = self.get("/fapi/v1/exchangeInfo", &[]).await?;
        let info: ExchangeInfo = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: e.to_string(),
        })?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING" && s.contract_type == "PERPETUAL")
            .map(|s| Symbol::new(s.symbol))
            .collect())
    }

    async fn get_candles(&self, symbol: &Symbol, interval: Timeframe, limit: u32) -> ProviderResult<Vec<Candle>> {
        let response = self
            .get(
                "/fapi/v1/klines",
                &[
                    ("symbol", self.denormalize(symbol)),
                    ("interval", interval.as_str().to_string()),
                    ("limit", limit.min(1500).to_string()),
                ],
            )
            .await?;

        let klines: Vec<Kline> = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: e.to_string(),
        })?;

        klines
            .into_iter()
            .map(|k| {
                Ok(Candle {
                    open_time: DateTime::from_timestamp_millis(k.0).unwrap_or_else(Utc::now),
                    open: parse_f64(&k.1, VENUE_ID)?,
                    high: parse_f64(&k.2, VENUE_ID)?,
                    low: parse_f64(&k.3, VENUE_ID)?,
                    close: parse_f64(&k.4, VENUE_ID)?,
                    volume: parse_f64(&k.5, VENUE_ID)?,
                })
            })
            .collect()
    }

    async fn get_order_book(&self, symbol: &Symbol, depth: u32) -> ProviderResult<Option<OrderBookSnapshot>> {
        let allowed = [5, 10, 20, 50, 100, 500, 1000];
        let limit = allowed.iter().copied().find(|l| *l >= depth).unwrap_or(1000);

        let response = self
            .get(
                "/fapi/v1/depth",
                &[("symbol", self.denormalize(symbol)), ("limit", limit.to_string())],
            )
            .await?;

        let depth_resp: DepthResponse = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: e.to_string(),
        })?;

        let to_levels = |raw: Vec<(String, String)>| -> ProviderResult<Vec<BookLevel>> {
            raw.into_iter()
                .map(|(p, q)| {
                    Ok(BookLevel {
                        price: parse_f64(&p, VENUE_ID)?,
                        size: parse_f64(&q, VENUE_ID)?,
                    })
                })
                .collect()
        };

        Ok(Some(OrderBookSnapshot::new(
            to_levels(depth_resp.bids)?,
            to_levels(depth_resp.asks)?,
        )))
    }

    async fn get_trades(&self, symbol: &Symbol, limit: u32) -> ProviderResult<Option<Vec<TradeTick>>> {
        let response = self
            .get(
                "/fapi/v1/trades",
                &[("symbol", self.denormalize(symbol)), ("limit", limit.min(1000).to_string())],
            )
            .await?;

        let trades: Vec<TradeResponse> = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: e.to_string(),
        })?;

        let ticks = trades
            .into_iter()
            .map(|t| {
                Ok(TradeTick {
                    timestamp: DateTime::from_timestamp_millis(t.time).unwrap_or_else(Utc::now),
                    price: parse_f64(&t.price, VENUE_ID)?,
                    size: parse_f64(&t.qty, VENUE_ID)?,
                    is_buyer_maker: t.is_buyer_maker,
                })
            })
            .collect::<ProviderResult<Vec<_>>>()?;

        Ok(Some(ticks))
    }

    async fn get_open_interest(&self, symbol: &Symbol) -> ProviderResult<Option<OpenInterestSnapshot>> {
        let response = self
            .get("/fapi/v1/openInterest", &[("symbol", self.denormalize(symbol))])
            .await?;

        let oi: OpenInterestResponse = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: e.to_string(),
        })?;

        let open_interest = parse_f64(&oi.open_interest, VENUE_ID)?;
        let last_price = self.get_last_price(symbol).await.unwrap_or(0.0);

        Ok(Some(OpenInterestSnapshot {
            open_interest,
            open_interest_usd: open_interest * last_price,
            delta: None,
        }))
    }

    async fn get_funding(&self, symbol: &Symbol) -> ProviderResult<Option<FundingSnapshot>> {
        let response = self
            .get("/fapi/v1/premiumIndex", &[("symbol", self.denormalize(symbol))])
            .await?;

        let premium: PremiumIndexResponse = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: e.to_string(),
        })?;

        Ok(Some(FundingSnapshot {
            rate: parse_f64(&premium.last_funding_rate, VENUE_ID)?,
            next_funding_time: DateTime::from_timestamp_millis(premium.next_funding_time).unwrap_or_else(Utc::now),
            interval_hours: 8,
        }))
    }

    async fn get_liquidations(&self, _symbol: &Symbol) -> ProviderResult<Option<LiquidationSnapshot>> {
        // Binance's public REST surface has no liquidation-feed endpoint;
        // only the websocket force-order stream carries it, which is
        // outside this read-path connector.
        Ok(None)
    }

    async fn get_last_price(&self, symbol: &Symbol) -> ProviderResult<f64> {
        let response = self
            .get("/fapi/v1/ticker/price", &[("symbol", self.denormalize(symbol))])
            .await?;

        let ticker: TickerPriceResponse = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: VENUE_ID.to_string(),
            message: e.to_string(),
        })?;

        parse_f64(&ticker.price, VENUE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_identity_for_upper_symbols() {
        let provider = BinanceProvider::new(Arc::new(RateLimiterRegistry::new(1200, Duration::from_secs(60))));
        let symbol = provider.normalize("btcusdt");
        assert_eq!(provider.denormalize(&symbol), "BTCUSDT");
    }
}
