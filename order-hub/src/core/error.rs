use crate::cart::CartStorageError;
use crate::orders::StoreError;
use shared::ErrorCode;
use thiserror::Error;

/// Hub startup errors
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Failed to create work directory {path}: {source}")]
    WorkDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Order store: {0}")]
    Store(#[from] StoreError),

    #[error("Cart storage: {0}")]
    Cart(#[from] CartStorageError),
}

impl HubError {
    pub fn code(&self) -> ErrorCode {
        match self {
            HubError::WorkDir { .. } => ErrorCode::InternalError,
            HubError::Store(e) => e.code(),
            HubError::Cart(e) => e.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
