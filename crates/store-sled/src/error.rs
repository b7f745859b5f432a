use ordkv_store::{StoreError, StoreReadError};

/// Error type for the sled backend.
#[derive(Debug, thiserror::Error)]
pub enum SledError {
    /// Error from the sled engine.
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Store model error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The database is still open through a handle from the same connector.
    #[error("Database at {} is still open", .0.display())]
    InUse(std::path::PathBuf),

    /// Filesystem error outside the engine, e.g. while destroying a database.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreReadError for SledError {
    fn into_store_error(self) -> StoreError {
        match self {
            SledError::Store(e) => e,
            other => StoreError::from_err(other),
        }
    }
}
