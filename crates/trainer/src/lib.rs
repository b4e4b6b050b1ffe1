pub mod config;
pub mod error;
pub mod logistic;
pub mod metrics;
pub mod progress;
pub mod split;
pub mod trainer;

pub use config::TrainingConfig;
pub use error::{TrainerError, TrainerResult};
pub use metrics::{ConfusionMatrix, Evaluation};
pub use progress::{ProgressSnapshot, TrainingPhase, TrainingProgress, TrainingState};
pub use split::{temporal_split, Split};
pub use trainer::{Trainer, TrainingOutcome, TrainingRun, TrainingRunConfig};
