//! Utilities for testing the sled store implementation.

use crate::{DatabaseArguments, SledKv};
use tempfile::{TempDir, tempdir};

/// Creates a sled database in a temporary directory. The directory is
/// removed when the returned [`TempDir`] drops, so keep it alive for as long
/// as the store is in use.
pub fn create_test_db() -> (TempDir, SledKv) {
    let dir = tempdir().unwrap();
    let db = DatabaseArguments::new()
        .with_cache_capacity(Some(crate::MEGABYTE * 8))
        .with_flush_every_ms(None)
        .open(dir.path())
        .unwrap();
    (dir, db)
}
