//! Error types for accessor operations.

use crate::config::ConfigError;
use ordkv_store::{StoreError, StoreReadError};

/// Result type alias for accessor operations.
pub type AccessorResult<T, E = AccessorError> = Result<T, E>;

/// Error type for accessor operations.
///
/// Read paths never surface these. A failed or missing read resolves to an
/// absent value, so only writes, configuration and the task handle return
/// errors to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AccessorError {
    /// The store rejected a write, or the write transaction failed to
    /// commit.
    #[error("write failed during {op}: {source}")]
    WriteFailure {
        /// The accessor operation that failed.
        op: &'static str,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// The value could not be serialized.
    #[error("failed to encode value for key {key:?}: {source}")]
    Encode {
        /// The key being written.
        key: String,
        /// The serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The encode hook declined to produce bytes for the value.
    #[error("encode hook rejected value for key {0:?}")]
    HookRejected(String),

    /// Keys must be non-empty when stored.
    #[error("empty keys cannot be stored")]
    EmptyKey,

    /// Opening, reopening or destroying the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The store is in use by the calling thread, e.g. from inside an
    /// enumeration callback, so `op` could not release it.
    #[error("store is in use, cannot {op}")]
    Busy {
        /// The lifecycle operation that was refused.
        op: &'static str,
    },

    /// The configuration is incomplete or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The accessor task was cancelled.
    #[error("Task cancelled")]
    Cancelled,

    /// Failed to send a request to the accessor task.
    ///
    /// Only the detached write path reports this. It means the request
    /// channel is full because the task cannot keep up. A closed channel is
    /// reported as [`AccessorError::Cancelled`] instead.
    #[error("failed to send request to accessor task")]
    SendFailed,
}

impl AccessorError {
    /// Wrap a backend error raised while writing.
    pub fn write<E: StoreReadError>(op: &'static str, err: E) -> Self {
        Self::WriteFailure { op, source: err.into_store_error() }
    }

    /// Create a store error from any error type.
    pub fn store<E>(err: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::Store(StoreError::from_err(err))
    }
}
