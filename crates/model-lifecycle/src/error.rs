use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("no previous model id recorded for horizon {0:?}; cannot roll back")]
    NoPreviousModel(core_types::Horizon),

    #[error("candidate model {0} is not registered as shadow or candidate for its horizon")]
    UnknownCandidate(String),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
