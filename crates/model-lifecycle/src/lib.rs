pub mod auto;
pub mod error;
pub mod event_log;
pub mod guardrails;
pub mod performance;
pub mod registry;
pub mod scheduler;

pub use auto::{AutoLifecycleController, OutcomeSource, PassSummary, DEFAULT_EVALUATION_WINDOW_DAYS};
pub use error::{LifecycleError, LifecycleResult};
pub use event_log::{parse_event_type, EventLog};
pub use guardrails::GuardrailStore;
pub use performance::{ComparisonPolicy, PromotionPolicy, RollbackRuleSet};
pub use registry::ModelRegistry;
pub use scheduler::{LifecycleScheduler, SchedulerConfig};
