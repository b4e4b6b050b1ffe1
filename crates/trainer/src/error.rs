use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(#[from] ml_dataset::DatasetError),

    #[error("not enough rows to train: got {got}, need at least {need}")]
    InsufficientData { got: usize, need: usize },

    #[error("invalid training config: {0}")]
    InvalidConfig(String),

    #[error("training run was cancelled")]
    Cancelled,
}

pub type TrainerResult<T> = Result<T, TrainerError>;
