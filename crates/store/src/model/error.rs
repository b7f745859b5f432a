/// Error type for store transactions and cursors.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Boxed error. Indicates an issue with the DB backend.
    #[error(transparent)]
    Inner(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Indicates that a write transaction is already in progress.
    #[error("A write transaction is already in progress")]
    WriteLocked,

    /// A cursor mutation was requested while the cursor was not positioned
    /// on an entry.
    #[error("Cursor is not positioned on an entry")]
    Unpositioned,
}

impl StoreError {
    /// Internal helper to create a `StoreError::Inner` from any error.
    pub fn from_err<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Inner(Box::new(err))
    }
}

/// Trait to convert backend-specific errors into [`StoreError`].
pub trait StoreReadError: std::error::Error + From<StoreError> + Send + Sync + 'static {
    /// Convert the error into a `StoreError`.
    fn into_store_error(self) -> StoreError;
}

impl StoreReadError for StoreError {
    fn into_store_error(self) -> StoreError {
        self
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
