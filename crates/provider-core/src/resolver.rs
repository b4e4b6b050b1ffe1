use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use core_types::Symbol;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::health::ProviderStatus;
use crate::registry::{ProviderRegistry, ProviderRegistryEntry, MOCK_PROVIDER_ID};

const CATALOG_TTL: Duration = Duration::from_secs(5 * 60);

/// Symbols assumed tradeable almost everywhere; used to let the resolver
/// answer optimistically when a live catalog fetch fails or is stale.
fn common_set() -> &'static HashSet<&'static str> {
    use std::sync::OnceLock;
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        ["BTCUSDT", "ETHUSDT", "SOLUSDT", "BNBUSDT", "XRPUSDT"]
            .into_iter()
            .collect()
    })
}

struct CachedCatalog {
    symbols: HashSet<Symbol>,
    fetched_at: Instant,
}

impl CachedCatalog {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < CATALOG_TTL
    }
}

/// Maps a symbol to the best live provider for it. Read-mostly: catalog
/// fetches are cached per provider with a coarse 5-minute TTL, so repeated
/// resolves within that window never re-hit the network.
pub struct SymbolResolver {
    registry: Arc<ProviderRegistry>,
    catalogs: DashMap<String, CachedCatalog>,
}

impl SymbolResolver {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            catalogs: DashMap::new(),
        }
    }

    fn cached_contains(&self, provider_id: &str, symbol: &Symbol) -> Option<bool> {
        self.catalogs.get(provider_id).and_then(|c| {
            if c.is_fresh() {
                Some(c.symbols.contains(symbol))
            } else {
                None
            }
        })
    }

    async fn fetch_and_cache(&self, entry: &ProviderRegistryEntry) -> Option<HashSet<Symbol>> {
        match entry.provider.list_symbols().await {
            Ok(symbols) => {
                let set: HashSet<Symbol> = symbols.into_iter().collect();
                self.catalogs.insert(
                    entry.provider.id().to_string(),
                    CachedCatalog {
                        symbols: set.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Some(set)
            }
            Err(_) => None,
        }
    }

    /// Resolve never fails for supported symbols: the mock provider is the
    /// fallback of last resort.
    pub async fn resolve(&self, symbol: &Symbol) -> ProviderRegistryEntry {
        let entries = self.registry.ordered_enabled();
        let other_providers_exist = entries.iter().any(|e| e.provider.id() != MOCK_PROVIDER_ID);
        let in_common_set = common_set().contains(symbol.as_str());

        for entry in &entries {
            if entry.provider.health().status == ProviderStatus::Down {
                continue;
            }
            if entry.provider.id() == MOCK_PROVIDER_ID && in_common_set && other_providers_exist {
                continue;
            }

            if let Some(hit) = self.cached_contains(entry.provider.id(), symbol) {
                if hit {
                    return entry.clone();
                }
                continue;
            }

            match self.fetch_and_cache(entry).await {
                Some(set) => {
                    if set.contains(symbol) {
                        return entry.clone();
                    }
                }
                None => {
                    if in_common_set && entry.provider.id() != MOCK_PROVIDER_ID {
                        return entry.clone();
                    }
                }
            }
        }

        self.registry.mock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ExchangeProvider, ProviderCapabilities};
    use crate::error::{ProviderError, ProviderResult};
    use crate::health::{HealthTracker, ProviderHealth};
    use crate::registry::ProviderConfig;
    use async_trait::async_trait;
    use core_types::{Candle, FundingSnapshot, LiquidationSnapshot, OpenInterestSnapshot, OrderBookSnapshot, Timeframe, TradeTick};

    struct FakeProvider {
        id: String,
        catalog: Vec<Symbol>,
        tracker: HealthTracker,
        caps: ProviderCapabilities,
        fail_catalog: bool,
    }

    #[async_trait]
    impl ExchangeProvider for FakeProvider {
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
            if self.fail_catalog {
                Err(ProviderError::Http { provider: self.id.clone(), message: "boom".into() })
            } else {
                Ok(self.catalog.clone())
            }
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

    fn caps() -> ProviderCapabilities {
        ProviderCapabilities {
            market_types: vec!["perpetual".into()],
            supports_order_book: true,
            supports_trades: true,
            supports_open_interest: true,
            supports_funding: true,
            supports_liquidations: false,
            declared_rate_limit_per_minute: 1200,
        }
    }

    fn config(priority: i32) -> ProviderConfig {
        ProviderConfig {
            enabled: true,
            priority,
            timeout: Duration::from_secs(5),
            retries: 2,
            tracked_symbols: vec![],
            poll_interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn scenario_s2_mixed_health_falls_through_to_mock() {
        let mock: Arc<dyn ExchangeProvider> = Arc::new(FakeProvider {
            id: MOCK_PROVIDER_ID.to_string(),
            catalog: vec![Symbol::new("FOOBAR")],
            tracker: HealthTracker::new(),
            caps: caps(),
            fail_catalog: false,
        });
        let registry = Arc::new(ProviderRegistry::new(mock));

        let a_down_tracker = HealthTracker::new();
        for _ in 0..5 {
            a_down_tracker.record_failure(chrono::Utc::now());
        }
        let provider_a: Arc<dyn ExchangeProvider> = Arc::new(FakeProvider {
            id: "a".to_string(),
            catalog: vec![Symbol::new("BTCUSDT")],
            tracker: a_down_tracker,
            caps: caps(),
            fail_catalog: false,
        });
        registry.register(provider_a, config(10));

        let provider_b: Arc<dyn ExchangeProvider> = Arc::new(FakeProvider {
            id: "b".to_string(),
            catalog: vec![Symbol::new("ETHUSDT")],
            tracker: HealthTracker::new(),
            caps: caps(),
            fail_catalog: false,
        });
        registry.register(provider_b, config(5));

        let resolver = SymbolResolver::new(registry);

        let resolved = resolver.resolve(&Symbol::new("ETHUSDT")).await;
        assert_eq!(resolved.provider.id(), "b");

        let resolved = resolver.resolve(&Symbol::new("FOOBAR")).await;
        assert_eq!(resolved.provider.id(), MOCK_PROVIDER_ID);
    }

    #[tokio::test]
    async fn scenario_s3_no_non_mock_providers_returns_mock() {
        let mock: Arc<dyn ExchangeProvider> = Arc::new(FakeProvider {
            id: MOCK_PROVIDER_ID.to_string(),
            catalog: vec![],
            tracker: HealthTracker::new(),
            caps: caps(),
            fail_catalog: false,
        });
        let registry = Arc::new(ProviderRegistry::new(mock));
        let resolver = SymbolResolver::new(registry);

        let resolved = resolver.resolve(&Symbol::new("ANYTHING")).await;
        assert_eq!(resolved.provider.id(), MOCK_PROVIDER_ID);
    }
}
