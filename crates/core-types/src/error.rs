use thiserror::Error;

/// Error kinds shared across the core. Transient/partial-data conditions are
/// not modeled here — callers that can recover locally (collector,
/// indicator catalog, backfill) never propagate a `CoreError` for them, they
/// record the gap and move on instead.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("registry conflict: {0}")]
    RegistryConflict(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
