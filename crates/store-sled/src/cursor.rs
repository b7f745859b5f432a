//! Cursor wrappers for sled trees.
//!
//! sled exposes ordered range iterators rather than positioned cursors. Each
//! positioning call here opens a short range scan from the cursor's current
//! key and takes its first entry.

use crate::{SledError, tx::to_bytes};
use bytes::Bytes;
use ordkv_store::{
    CursorPosition, KvTraverse, KvTraverseMut, RawKeyValue, RawValue, StoreError,
    ops::{KeyBounds, QueuedOps},
};
use parking_lot::Mutex;
use std::ops::Bound;

const ALL: KeyBounds<'static> = (Bound::Unbounded, Bound::Unbounded);

/// Cursor over the committed entries of a sled tree.
pub struct SledCursor<'a> {
    tree: &'a sled::Tree,
    pos: CursorPosition,
}

impl core::fmt::Debug for SledCursor<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SledCursor").field("key", &self.pos.key()).finish_non_exhaustive()
    }
}

impl<'a> SledCursor<'a> {
    pub(crate) const fn new(tree: &'a sled::Tree) -> Self {
        Self { tree, pos: CursorPosition::new() }
    }

    fn seek(&self, bounds: KeyBounds<'_>, reverse: bool) -> Result<Option<(Bytes, Bytes)>, SledError> {
        let mut range = self.tree.range::<&[u8], _>(bounds);
        let found = if reverse { range.next_back() } else { range.next() };
        Ok(found.transpose()?.map(to_bytes))
    }
}

impl KvTraverse<SledError> for SledCursor<'_> {
    fn first<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let found = self.tree.first()?.map(to_bytes);
        Ok(self.pos.land(found))
    }

    fn last<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let found = self.tree.last()?.map(to_bytes);
        Ok(self.pos.land(found))
    }

    fn exact<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawValue<'b>>, SledError> {
        let found = self.tree.get(key)?.map(|v| (Bytes::copy_from_slice(key), Bytes::from(v.to_vec())));
        Ok(self.pos.land(found).map(|(_, v)| v))
    }

    fn lower_bound<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let found = self.seek((Bound::Included(key), Bound::Unbounded), false)?;
        Ok(self.pos.land(found))
    }

    fn read_next<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let Some(current) = self.pos.key().cloned() else {
            return Ok(None);
        };
        let found = self.seek((Bound::Excluded(current.as_ref()), Bound::Unbounded), false)?;
        Ok(self.pos.land(found))
    }

    fn read_prev<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let Some(current) = self.pos.key().cloned() else {
            return Ok(None);
        };
        let found = self.seek((Bound::Unbounded, Bound::Excluded(current.as_ref())), true)?;
        Ok(self.pos.land(found))
    }
}

/// Cursor that merges a sled tree with a write transaction's queued
/// operations.
pub struct SledCursorMut<'a> {
    tree: &'a sled::Tree,
    queued: &'a Mutex<QueuedOps>,
    pos: CursorPosition,
}

impl core::fmt::Debug for SledCursorMut<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SledCursorMut").field("key", &self.pos.key()).finish_non_exhaustive()
    }
}

impl<'a> SledCursorMut<'a> {
    pub(crate) const fn new(tree: &'a sled::Tree, queued: &'a Mutex<QueuedOps>) -> Self {
        Self { tree, queued, pos: CursorPosition::new() }
    }

    fn seek(&self, bounds: KeyBounds<'_>, reverse: bool) -> Result<Option<(Bytes, Bytes)>, SledError> {
        let range = self.tree.range::<&[u8], _>(bounds);
        let queued = self.queued.lock();
        let found =
            if reverse { queued.merge(bounds, true, range.rev()) } else { queued.merge(bounds, false, range) };
        found.map_err(Into::into)
    }
}

impl KvTraverse<SledError> for SledCursorMut<'_> {
    fn first<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let found = self.seek(ALL, false)?;
        Ok(self.pos.land(found))
    }

    fn last<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let found = self.seek(ALL, true)?;
        Ok(self.pos.land(found))
    }

    fn exact<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawValue<'b>>, SledError> {
        let found = self.seek((Bound::Included(key), Bound::Included(key)), false)?;
        Ok(self.pos.land(found).map(|(_, v)| v))
    }

    fn lower_bound<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let found = self.seek((Bound::Included(key), Bound::Unbounded), false)?;
        Ok(self.pos.land(found))
    }

    fn read_next<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let Some(current) = self.pos.key().cloned() else {
            return Ok(None);
        };
        let found = self.seek((Bound::Excluded(current.as_ref()), Bound::Unbounded), false)?;
        Ok(self.pos.land(found))
    }

    fn read_prev<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, SledError> {
        let Some(current) = self.pos.key().cloned() else {
            return Ok(None);
        };
        let found = self.seek((Bound::Unbounded, Bound::Excluded(current.as_ref())), true)?;
        Ok(self.pos.land(found))
    }
}

impl KvTraverseMut<SledError> for SledCursorMut<'_> {
    fn delete_current(&mut self) -> Result<(), SledError> {
        let Some(key) = self.pos.key() else {
            return Err(StoreError::Unpositioned.into());
        };
        self.queued.lock().delete(key);
        Ok(())
    }
}
