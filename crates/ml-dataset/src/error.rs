use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("store error: {0}")]
    Store(#[from] observation_store::StoreError),
}

pub type DatasetResult<T> = Result<T, DatasetError>;
