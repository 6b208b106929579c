use thiserror::Error;

use crate::domain::ParseCentsError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("A sale needs at least one item")]
    EmptySale,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The change is applied in memory but could not be saved because the
    /// storage is out of space.
    #[error("Storage is full, the ledger was not saved")]
    StorageFull,

    /// The change is applied in memory but could not be saved.
    #[error("Failed to save the ledger: {0}")]
    Storage(StorageError),

    #[error("Failed to encode the ledger: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QuotaExceeded { .. } => AppError::StorageFull,
            other => AppError::Storage(other),
        }
    }
}

impl From<ParseCentsError> for AppError {
    fn from(err: ParseCentsError) -> Self {
        AppError::InvalidAmount(err.to_string())
    }
}
