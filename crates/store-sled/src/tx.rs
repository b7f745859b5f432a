//! Transaction wrappers for sled.

use crate::{SledCursor, SledCursorMut, SledError};
use bytes::Bytes;
use ordkv_store::{
    RawKvRead, RawKvWrite, RawValue,
    ops::{Lookup, QueuedOp, QueuedOps},
};
use parking_lot::{Mutex, RawMutex, lock_api::ArcMutexGuard};
use std::borrow::Cow;

/// Read-only transaction over a sled tree.
///
/// sled reads are not snapshotted, so this is a thin view over the live tree.
pub struct SledRoTx {
    tree: sled::Tree,
}

impl core::fmt::Debug for SledRoTx {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SledRoTx").finish_non_exhaustive()
    }
}

impl SledRoTx {
    pub(crate) const fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }
}

impl RawKvRead for SledRoTx {
    type Error = SledError;

    type Traverse<'a> = SledCursor<'a>;

    fn raw_traverse<'a>(&'a self) -> Result<Self::Traverse<'a>, Self::Error> {
        Ok(SledCursor::new(&self.tree))
    }

    fn raw_get<'a>(&'a self, key: &[u8]) -> Result<Option<RawValue<'a>>, Self::Error> {
        Ok(self.tree.get(key)?.map(|v| Cow::Owned(v.to_vec())))
    }

    fn raw_contains(&self, key: &[u8]) -> Result<bool, Self::Error> {
        self.tree.contains_key(key).map_err(Into::into)
    }
}

/// Read-write transaction over a sled tree.
///
/// Holds the store's writer lock for its lifetime. Operations are queued in
/// memory and applied as one [`sled::Batch`] on commit.
pub struct SledRwTx {
    tree: sled::Tree,
    queued: Mutex<QueuedOps>,
    sync_on_commit: bool,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl core::fmt::Debug for SledRwTx {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SledRwTx")
            .field("queued", &*self.queued.lock())
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

impl SledRwTx {
    pub(crate) fn new(
        tree: sled::Tree,
        guard: ArcMutexGuard<RawMutex, ()>,
        sync_on_commit: bool,
    ) -> Self {
        Self { tree, queued: Mutex::new(QueuedOps::new()), sync_on_commit, _guard: guard }
    }

    /// Get a mutable cursor. The cursor sees both committed data and pending
    /// writes from this transaction.
    pub fn cursor_mut(&self) -> SledCursorMut<'_> {
        SledCursorMut::new(&self.tree, &self.queued)
    }

    /// Build the batch that applies the queued operations.
    fn build_batch(&self, queued: QueuedOps) -> Result<sled::Batch, SledError> {
        let (cleared, ops) = queued.into_parts();
        let mut batch = sled::Batch::default();

        if cleared {
            for key in self.tree.iter().keys() {
                let key = key?;
                if !ops.contains_key(&*key) {
                    batch.remove(key);
                }
            }
        }

        for (key, op) in ops {
            match op {
                QueuedOp::Put(value) => batch.insert(key.as_ref(), value.as_ref()),
                QueuedOp::Delete => batch.remove(key.as_ref()),
            }
        }
        Ok(batch)
    }
}

impl RawKvRead for SledRwTx {
    type Error = SledError;

    type Traverse<'a> = SledCursorMut<'a>;

    fn raw_traverse<'a>(&'a self) -> Result<Self::Traverse<'a>, Self::Error> {
        Ok(self.cursor_mut())
    }

    fn raw_get<'a>(&'a self, key: &[u8]) -> Result<Option<RawValue<'a>>, Self::Error> {
        // Check queued operations first (read-your-writes consistency)
        match self.queued.lock().lookup(key) {
            Lookup::Put(value) => return Ok(Some(Cow::Owned(value.to_vec()))),
            Lookup::Deleted => return Ok(None),
            Lookup::Untouched => {}
        }
        Ok(self.tree.get(key)?.map(|v| Cow::Owned(v.to_vec())))
    }
}

impl RawKvWrite for SledRwTx {
    type TraverseMut<'a> = SledCursorMut<'a>;

    fn raw_traverse_mut<'a>(&'a self) -> Result<Self::TraverseMut<'a>, Self::Error> {
        Ok(self.cursor_mut())
    }

    fn queue_raw_put(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.queued.lock().put(key, value);
        Ok(())
    }

    fn queue_raw_delete(&self, key: &[u8]) -> Result<(), Self::Error> {
        self.queued.lock().delete(key);
        Ok(())
    }

    fn queue_raw_clear(&self) -> Result<(), Self::Error> {
        self.queued.lock().clear();
        Ok(())
    }

    fn raw_commit(self) -> Result<(), Self::Error> {
        let queued = std::mem::take(&mut *self.queued.lock());
        if queued.is_empty() {
            return Ok(());
        }

        let batch = self.build_batch(queued)?;
        self.tree.apply_batch(batch)?;

        if self.sync_on_commit {
            let flushed = self.tree.flush()?;
            tracing::trace!(target: "ordkv::sled", flushed, "flushed on commit");
        }
        // The writer lock is released when `self` drops here
        Ok(())
    }
}

/// Copy a sled entry into shared buffers.
pub(crate) fn to_bytes((k, v): (sled::IVec, sled::IVec)) -> (Bytes, Bytes) {
    (Bytes::copy_from_slice(&k), Bytes::copy_from_slice(&v))
}
