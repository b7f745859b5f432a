//! Connection traits for store backends.

use crate::model::RawKv;

/// Connector trait for store backends.
///
/// Abstracts the opening process, allowing different backends to implement
/// their own initialization logic. A connector describes *where* a store
/// lives, so it can also remove the store's on-disk footprint.
pub trait StoreConnect {
    /// The store type produced by this connector.
    type Store: RawKv;

    /// The error type returned by connection attempts.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the store.
    ///
    /// Synchronous since most embedded engines use sync initialization.
    fn connect(&self) -> Result<Self::Store, Self::Error>;

    /// Remove the store's persisted data.
    ///
    /// Callers must drop every open handle to the store first. Removing a
    /// store that does not exist is not an error.
    fn destroy(&self) -> Result<(), Self::Error>;
}
