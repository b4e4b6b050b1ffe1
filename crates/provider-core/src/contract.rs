use async_trait::async_trait;
use core_types::{
    Candle, FundingSnapshot, LiquidationSnapshot, OpenInterestSnapshot, OrderBookSnapshot, Symbol,
    Timeframe, TradeTick,
};

use crate::error::ProviderResult;
use crate::health::ProviderHealth;

/// Which streams and market types a provider supports, declared once at
/// construction. The collector consults this before attempting a fetch a
/// provider has already told it not to bother with.
#[derive(Debug, Clone)]
pub struct ProviderCapabilities {
    pub market_types: Vec<String>,
    pub supports_order_book: bool,
    pub supports_trades: bool,
    pub supports_open_interest: bool,
    pub supports_funding: bool,
    pub supports_liquidations: bool,
    pub declared_rate_limit_per_minute: u32,
}

/// Normalized read-only interface to an exchange. Implementations are pure
/// observers — no trading side effects, no shared writes besides their own
/// health. `normalize`/`denormalize` must round-trip for any symbol the
/// provider supports.
#[async_trait]
pub trait ExchangeProvider: Send + Sync {
    fn id(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    fn health(&self) -> ProviderHealth;

    /// Force health back to UP with a zeroed error streak, e.g. after an
    /// operator intervention.
    fn reset_health(&self);

    /// Convert a venue-native symbol string into the canonical `Symbol`.
    fn normalize(&self, raw: &str) -> Symbol;

    /// Convert a canonical `Symbol` into this venue's native form.
    fn denormalize(&self, symbol: &Symbol) -> String;

    async fn list_symbols(&self) -> ProviderResult<Vec<Symbol>>;

    async fn get_candles(&self, symbol: &Symbol, interval: Timeframe, limit: u32) -> ProviderResult<Vec<Candle>>;

    async fn get_order_book(&self, symbol: &Symbol, depth: u32) -> ProviderResult<Option<OrderBookSnapshot>>;

    async fn get_trades(&self, symbol: &Symbol, limit: u32) -> ProviderResult<Option<Vec<TradeTick>>>;

    async fn get_open_interest(&self, symbol: &Symbol) -> ProviderResult<Option<OpenInterestSnapshot>>;

    async fn get_funding(&self, symbol: &Symbol) -> ProviderResult<Option<FundingSnapshot>>;

    async fn get_liquidations(&self, symbol: &Symbol) -> ProviderResult<Option<LiquidationSnapshot>>;

    async fn get_last_price(&self, symbol: &Symbol) -> ProviderResult<f64>;
}
