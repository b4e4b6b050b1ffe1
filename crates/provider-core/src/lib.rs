pub mod contract;
pub mod error;
pub mod health;
pub mod rate_limiter;
pub mod registry;
pub mod resolver;

pub use contract::{ExchangeProvider, ProviderCapabilities};
pub use error::{ProviderError, ProviderResult};
pub use health::{HealthTracker, ProviderHealth, ProviderStatus};
pub use rate_limiter::RateLimiterRegistry;
pub use registry::{ProviderConfig, ProviderRegistry, ProviderRegistryEntry, MOCK_PROVIDER_ID};
pub use resolver::SymbolResolver;
