//! sled store connector.

use crate::{DatabaseArguments, SledError, SledKv};
use ordkv_store::StoreConnect;
use parking_lot::Mutex;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Weak},
};

/// Connector for sled stores.
///
/// Holds the database directory and the arguments used to open it. The same
/// connector can later remove the directory via [`StoreConnect::destroy`].
///
/// The connector remembers the stores it has opened. `destroy` refuses with
/// [`SledError::InUse`] while any of them, or any clone of them, is still
/// alive. Handles opened some other way are not tracked.
///
/// # Example
///
/// ```ignore
/// use ordkv_sled::{DatabaseArguments, SledConnector};
///
/// let connector = SledConnector::new("/tmp/ordkv")
///     .with_db_args(DatabaseArguments::new().with_sync_on_commit(true));
/// let store = connector.connect()?;
/// ```
#[derive(Clone)]
pub struct SledConnector {
    path: PathBuf,
    db_args: DatabaseArguments,
    opened: Arc<Mutex<Vec<Weak<Mutex<()>>>>>,
}

impl core::fmt::Debug for SledConnector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SledConnector")
            .field("path", &self.path)
            .field("db_args", &self.db_args)
            .field("open_handles", &self.open_handles())
            .finish()
    }
}

impl SledConnector {
    /// Create a new connector with default database arguments.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), db_args: DatabaseArguments::new(), opened: Default::default() }
    }

    /// Set custom database arguments.
    #[must_use]
    pub fn with_db_args(mut self, db_args: DatabaseArguments) -> Self {
        self.db_args = db_args;
        self
    }

    /// Get a reference to the path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a reference to the database arguments.
    pub const fn db_args(&self) -> &DatabaseArguments {
        &self.db_args
    }

    /// Number of stores opened through this connector that are still
    /// alive. Clones of one store count once.
    pub fn open_handles(&self) -> usize {
        let mut opened = self.opened.lock();
        opened.retain(|handle| handle.strong_count() > 0);
        opened.len()
    }
}

impl StoreConnect for SledConnector {
    type Store = SledKv;
    type Error = SledError;

    fn connect(&self) -> Result<Self::Store, Self::Error> {
        let store = self.db_args.clone().open(&self.path)?;
        self.opened.lock().push(Arc::downgrade(&store.write_lock));
        Ok(store)
    }

    fn destroy(&self) -> Result<(), Self::Error> {
        if self.open_handles() > 0 {
            return Err(SledError::InUse(self.path.clone()));
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {
                tracing::debug!(target: "ordkv::sled", path = %self.path.display(), "removed database");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordkv_store::{RawKv, RawKvRead, RawKvWrite};
    use tempfile::tempdir;

    #[test]
    fn connect_then_destroy() {
        let dir = tempdir().unwrap();
        let connector = SledConnector::new(dir.path().join("db"));

        let store = connector.connect().unwrap();
        let writer = store.writer().unwrap();
        writer.queue_raw_put(b"k", b"v").unwrap();
        writer.raw_commit().unwrap();
        drop(store);

        assert!(connector.path().exists());
        connector.destroy().unwrap();
        assert!(!connector.path().exists());

        // A second destroy finds nothing and succeeds.
        connector.destroy().unwrap();

        let store = connector.connect().unwrap();
        assert!(store.reader().unwrap().raw_get(b"k").unwrap().is_none());
    }

    #[test]
    fn destroy_refuses_live_handles() {
        let dir = tempdir().unwrap();
        let connector = SledConnector::new(dir.path().join("db"));

        let store = connector.connect().unwrap();
        let clone = store.clone();
        drop(store);
        assert_eq!(connector.open_handles(), 1);

        assert!(matches!(connector.clone().destroy(), Err(SledError::InUse(_))));
        assert!(connector.path().exists());

        drop(clone);
        assert_eq!(connector.open_handles(), 0);
        connector.destroy().unwrap();
        assert!(!connector.path().exists());
    }
}
