use std::sync::Arc;
use std::time::Duration;

use core_types::Symbol;
use dashmap::DashMap;

use crate::contract::ExchangeProvider;

pub const MOCK_PROVIDER_ID: &str = "mock";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub priority: i32,
    pub timeout: Duration,
    pub retries: u32,
    pub tracked_symbols: Vec<Symbol>,
    pub poll_interval: Duration,
}

impl ProviderConfig {
    pub fn mock_default() -> Self {
        Self {
            enabled: true,
            priority: i32::MIN,
            timeout: Duration::from_secs(5),
            retries: 0,
            tracked_symbols: Vec::new(),
            poll_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct ProviderRegistryEntry {
    pub provider: Arc<dyn ExchangeProvider>,
    pub config: ProviderConfig,
}

/// Process-wide, ordered set of provider entries keyed by provider id.
/// Entries are created once at startup; only enable/disable, priority, and
/// health-reset mutations happen afterward. The mock provider is always
/// present so the resolver never has to handle an empty registry.
pub struct ProviderRegistry {
    entries: DashMap<String, ProviderRegistryEntry>,
}

impl ProviderRegistry {
    pub fn new(mock: Arc<dyn ExchangeProvider>) -> Self {
        let entries = DashMap::new();
        entries.insert(
            MOCK_PROVIDER_ID.to_string(),
            ProviderRegistryEntry {
                provider: mock,
                config: ProviderConfig::mock_default(),
            },
        );
        Self { entries }
    }

    pub fn register(&self, provider: Arc<dyn ExchangeProvider>, config: ProviderConfig) {
        self.entries
            .insert(provider.id().to_string(), ProviderRegistryEntry { provider, config });
    }

    /// Enabled entries in priority order, highest first, mock always last
    /// among equal priorities since it's seeded with `i32::MIN`.
    pub fn ordered_enabled(&self) -> Vec<ProviderRegistryEntry> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.config.enabled)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| b.config.priority.cmp(&a.config.priority));
        entries
    }

    pub fn get(&self, provider_id: &str) -> Option<ProviderRegistryEntry> {
        self.entries.get(provider_id).map(|e| e.value().clone())
    }

    pub fn mock(&self) -> ProviderRegistryEntry {
        self.get(MOCK_PROVIDER_ID).expect("mock provider always registered")
    }

    pub fn set_enabled(&self, provider_id: &str, enabled: bool) -> bool {
        if let Some(mut e) = self.entries.get_mut(provider_id) {
            e.config.enabled = enabled;
            true
        } else {
            false
        }
    }

    pub fn set_priority(&self, provider_id: &str, priority: i32) -> bool {
        if let Some(mut e) = self.entries.get_mut(provider_id) {
            e.config.priority = priority;
            true
        } else {
            false
        }
    }

    pub fn reset_health(&self, provider_id: &str) -> bool {
        match self.entries.get(provider_id) {
            Some(e) => {
                e.provider.reset_health();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ProviderCapabilities;
    use crate::error::ProviderResult;
    use crate::health::{HealthTracker, ProviderHealth};
    use async_trait::async_trait;
    use core_types::{Candle, FundingSnapshot, LiquidationSnapshot, OpenInterestSnapshot, OrderBookSnapshot, Timeframe, TradeTick};

    struct StubProvider {
        id: String,
        caps: ProviderCapabilities,
        tracker: HealthTracker,
    }

    #[async_trait]
    impl ExchangeProvider for StubProvider {
        fn id(&self) -> &str {
            &self.id
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
            Ok(vec![])
        }
        async fn get_candles(&self, _s: &Symbol, _i: Timeframe, _l: u32) -> ProviderResult<Vec<Candle>> {
            Ok(vec![])
        }
        async fn get_order_book(&self, _s: &Symbol, _d: u32) -> ProviderResult<Option<OrderBookSnapshot>> {
            Ok(None)
        }
        async fn get_trades(&self, _s: &Symbol, _l: u32) -> ProviderResult<Option<Vec<TradeTick>>> {
            Ok(None)
        }
        async fn get_open_interest(&self, _s: &Symbol) -> ProviderResult<Option<OpenInterestSnapshot>> {
            Ok(None)
        }
        async fn get_funding(&self, _s: &Symbol) -> ProviderResult<Option<FundingSnapshot>> {
            Ok(None)
        }
        async fn get_liquidations(&self, _s: &Symbol) -> ProviderResult<Option<LiquidationSnapshot>> {
            Ok(None)
        }
        async fn get_last_price(&self, _s: &Symbol) -> ProviderResult<f64> {
            Ok(0.0)
        }
    }

    fn stub(id: &str) -> Arc<dyn ExchangeProvider> {
        Arc::new(StubProvider {
            id: id.to_string(),
            caps: ProviderCapabilities {
                market_types: vec!["perpetual".into()],
                supports_order_book: true,
                supports_trades: true,
                supports_open_interest: true,
                supports_funding: true,
                supports_liquidations: false,
                declared_rate_limit_per_minute: 1200,
            },
            tracker: HealthTracker::new(),
        })
    }

    #[test]
    fn mock_is_always_present_and_lowest_priority() {
        let registry = ProviderRegistry::new(stub(MOCK_PROVIDER_ID));
        registry.register(
            stub("binance"),
            ProviderConfig {
                enabled: true,
                priority: 10,
                timeout: Duration::from_secs(5),
                retries: 2,
                tracked_symbols: vec![],
                poll_interval: Duration::from_secs(60),
            },
        );

        let ordered = registry.ordered_enabled();
        assert_eq!(ordered.first().unwrap().provider.id(), "binance");
        assert_eq!(ordered.last().unwrap().provider.id(), MOCK_PROVIDER_ID);
    }

    #[test]
    fn disabled_providers_are_excluded() {
        let registry = ProviderRegistry::new(stub(MOCK_PROVIDER_ID));
        registry.register(
            stub("bybit"),
            ProviderConfig {
                enabled: false,
                priority: 10,
                timeout: Duration::from_secs(5),
                retries: 2,
                tracked_symbols: vec![],
                poll_interval: Duration::from_secs(60),
            },
        );
        assert!(registry.ordered_enabled().iter().all(|e| e.provider.id() != "bybit"));
        registry.set_enabled("bybit", true);
        assert!(registry.ordered_enabled().iter().any(|e| e.provider.id() == "bybit"));
    }
}
