pub mod config;
pub mod dataset;
pub mod error;
pub mod flags;
pub mod outcome;

pub use config::{DatasetConfig, LabelConfig};
pub use dataset::DatasetBuilder;
pub use error::{DatasetError, DatasetResult};
pub use flags::{derive_flags, OutcomeFlags};
pub use outcome::OutcomeBuilder;
