//! In-memory key-value store implementation.
//!
//! This is not a good implementation for production use, but is useful for
//! testing.

use crate::{
    StoreConnect,
    model::{
        CursorPosition, KvTraverse, KvTraverseMut, RawKeyValue, RawKv, RawKvRead, RawKvWrite,
        RawValue, StoreError,
    },
    ops::{KeyBounds, Lookup, QueuedOp, QueuedOps},
};
use bytes::Bytes;
use parking_lot::{
    Mutex, RawRwLock, RwLock,
    lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard},
};
use std::{borrow::Cow, collections::BTreeMap, convert::Infallible, ops::Bound, sync::Arc};

type Store = BTreeMap<Bytes, Bytes>;

const ALL: KeyBounds<'static> = (Bound::Unbounded, Bound::Unbounded);

fn clone_entry((k, v): (&Bytes, &Bytes)) -> (Bytes, Bytes) {
    (k.clone(), v.clone())
}

/// A simple in-memory key-value store using a [`BTreeMap`].
///
/// The store is backed by an [`RwLock`]. As a result, this implementation
/// supports multiple concurrent read transactions, but write transactions
/// are exclusive, and cannot overlap with other read or write transactions.
/// Lock acquisition never blocks: a contended [`RawKv::writer`] call fails
/// with [`StoreError::WriteLocked`].
///
/// This implementation is primarily intended for testing and
/// development purposes.
#[derive(Clone, Default)]
pub struct MemKv {
    map: Arc<RwLock<Store>>,
}

impl core::fmt::Debug for MemKv {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemKv").finish_non_exhaustive()
    }
}

impl MemKv {
    /// Create a new empty in-memory KV store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Connecting to a [`MemKv`] hands out another handle to the same map.
/// Destroying it empties the map.
///
/// Handles sharing a map do not wait on each other. While one handle has a
/// write transaction open, [`RawKv::reader`] on any other fails with
/// [`StoreError::Inner`] instead of blocking, so an accessor over a shared
/// map reads entries as absent for as long as another accessor is writing.
/// Share one accessor rather than connecting several to the same map.
impl StoreConnect for MemKv {
    type Store = Self;
    type Error = StoreError;

    fn connect(&self) -> Result<Self::Store, Self::Error> {
        Ok(self.clone())
    }

    fn destroy(&self) -> Result<(), Self::Error> {
        self.map.try_write().ok_or(StoreError::WriteLocked)?.clear();
        Ok(())
    }
}

/// Read-only transaction for [`MemKv`].
pub struct MemKvRoTx {
    guard: ArcRwLockReadGuard<RawRwLock, Store>,
}

impl core::fmt::Debug for MemKvRoTx {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemKvRoTx").finish_non_exhaustive()
    }
}

/// Read-write transaction for [`MemKv`].
pub struct MemKvRwTx {
    guard: ArcRwLockWriteGuard<RawRwLock, Store>,
    queued: Mutex<QueuedOps>,
}

impl core::fmt::Debug for MemKvRwTx {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemKvRwTx").field("queued", &*self.queued.lock()).finish_non_exhaustive()
    }
}

impl MemKvRwTx {
    /// Get a mutable cursor. The cursor sees both committed data and pending
    /// writes from this transaction.
    pub fn cursor_mut(&self) -> MemKvCursorMut<'_> {
        MemKvCursorMut::new(&self.guard, &self.queued)
    }
}

/// Memory cursor for traversing committed entries.
pub struct MemKvCursor<'a> {
    table: &'a Store,
    pos: CursorPosition,
}

impl core::fmt::Debug for MemKvCursor<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemKvCursor").field("key", &self.pos.key()).finish()
    }
}

impl<'a> MemKvCursor<'a> {
    /// Create a new cursor over the given table.
    const fn new(table: &'a Store) -> Self {
        Self { table, pos: CursorPosition::new() }
    }
}

impl KvTraverse<StoreError> for MemKvCursor<'_> {
    fn first<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let found = self.table.first_key_value().map(clone_entry);
        Ok(self.pos.land(found))
    }

    fn last<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let found = self.table.last_key_value().map(clone_entry);
        Ok(self.pos.land(found))
    }

    fn exact<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawValue<'b>>, StoreError> {
        let found = self.table.get_key_value(key).map(clone_entry);
        Ok(self.pos.land(found).map(|(_, v)| v))
    }

    fn lower_bound<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let found = self
            .table
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(clone_entry);
        Ok(self.pos.land(found))
    }

    fn read_next<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let Some(current) = self.pos.key().cloned() else {
            return Ok(None);
        };
        let found = self
            .table
            .range::<[u8], _>((Bound::Excluded(current.as_ref()), Bound::Unbounded))
            .next()
            .map(clone_entry);
        Ok(self.pos.land(found))
    }

    fn read_prev<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let Some(current) = self.pos.key().cloned() else {
            return Ok(None);
        };
        let found = self
            .table
            .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(current.as_ref())))
            .next_back()
            .map(clone_entry);
        Ok(self.pos.land(found))
    }
}

/// Memory cursor that merges committed entries with a write transaction's
/// queued operations.
pub struct MemKvCursorMut<'a> {
    table: &'a Store,
    queued: &'a Mutex<QueuedOps>,
    pos: CursorPosition,
}

impl core::fmt::Debug for MemKvCursorMut<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemKvCursorMut").field("key", &self.pos.key()).finish_non_exhaustive()
    }
}

impl<'a> MemKvCursorMut<'a> {
    /// Create a new mutable cursor for the given table and queued operations.
    const fn new(table: &'a Store, queued: &'a Mutex<QueuedOps>) -> Self {
        Self { table, queued, pos: CursorPosition::new() }
    }

    /// Find the effective entry nearest the start of `bounds`.
    fn seek(&self, bounds: KeyBounds<'_>, reverse: bool) -> Option<(Bytes, Bytes)> {
        let range = self.table.range::<[u8], _>(bounds).map(|e| Ok(clone_entry(e)));
        let queued = self.queued.lock();
        let found: Result<_, Infallible> = if reverse {
            queued.merge(bounds, true, range.rev())
        } else {
            queued.merge(bounds, false, range)
        };
        found.unwrap_or_else(|never| match never {})
    }
}

impl KvTraverse<StoreError> for MemKvCursorMut<'_> {
    fn first<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let found = self.seek(ALL, false);
        Ok(self.pos.land(found))
    }

    fn last<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let found = self.seek(ALL, true);
        Ok(self.pos.land(found))
    }

    fn exact<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawValue<'b>>, StoreError> {
        let found = self.seek((Bound::Included(key), Bound::Included(key)), false);
        Ok(self.pos.land(found).map(|(_, v)| v))
    }

    fn lower_bound<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let found = self.seek((Bound::Included(key), Bound::Unbounded), false);
        Ok(self.pos.land(found))
    }

    fn read_next<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let Some(current) = self.pos.key().cloned() else {
            return Ok(None);
        };
        let found = self.seek((Bound::Excluded(current.as_ref()), Bound::Unbounded), false);
        Ok(self.pos.land(found))
    }

    fn read_prev<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StoreError> {
        let Some(current) = self.pos.key().cloned() else {
            return Ok(None);
        };
        let found = self.seek((Bound::Unbounded, Bound::Excluded(current.as_ref())), true);
        Ok(self.pos.land(found))
    }
}

impl KvTraverseMut<StoreError> for MemKvCursorMut<'_> {
    fn delete_current(&mut self) -> Result<(), StoreError> {
        let Some(key) = self.pos.key() else {
            return Err(StoreError::Unpositioned);
        };
        self.queued.lock().delete(key);
        Ok(())
    }
}

impl RawKv for MemKv {
    type RoTx = MemKvRoTx;
    type RwTx = MemKvRwTx;

    fn reader(&self) -> Result<Self::RoTx, StoreError> {
        let guard = self
            .map
            .try_read_arc()
            .ok_or_else(|| StoreError::Inner("Failed to acquire read lock".into()))?;
        Ok(MemKvRoTx { guard })
    }

    fn writer(&self) -> Result<Self::RwTx, StoreError> {
        let guard = self.map.try_write_arc().ok_or(StoreError::WriteLocked)?;
        Ok(MemKvRwTx { guard, queued: Mutex::new(QueuedOps::new()) })
    }
}

impl RawKvRead for MemKvRoTx {
    type Error = StoreError;

    type Traverse<'a> = MemKvCursor<'a>;

    fn raw_traverse<'a>(&'a self) -> Result<Self::Traverse<'a>, Self::Error> {
        Ok(MemKvCursor::new(&self.guard))
    }

    fn raw_get<'a>(&'a self, key: &[u8]) -> Result<Option<RawValue<'a>>, Self::Error> {
        Ok(self.guard.get(key).map(|bytes| Cow::Borrowed(bytes.as_ref())))
    }
}

impl RawKvRead for MemKvRwTx {
    type Error = StoreError;

    type Traverse<'a> = MemKvCursorMut<'a>;

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
        Ok(self.guard.get(key).map(|bytes| Cow::Borrowed(bytes.as_ref())))
    }
}

impl RawKvWrite for MemKvRwTx {
    type TraverseMut<'a> = MemKvCursorMut<'a>;

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
        let Self { mut guard, queued } = self;
        let (cleared, ops) = queued.into_inner().into_parts();
        if cleared {
            guard.clear();
        }
        for (key, op) in ops {
            match op {
                QueuedOp::Put(value) => {
                    guard.insert(key, value);
                }
                QueuedOp::Delete => {
                    guard.remove(&key);
                }
            }
        }
        // The write guard is dropped here, releasing the lock
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    fn put_all(store: &MemKv, entries: &[(&str, &str)]) {
        let writer = store.writer().unwrap();
        for (k, v) in entries {
            writer.queue_raw_put(k.as_bytes(), v.as_bytes()).unwrap();
        }
        writer.raw_commit().unwrap();
    }

    #[test]
    fn mem_conformance() {
        conformance::conformance(&MemKv::new());
    }

    #[test]
    fn test_connect_shares_map() {
        let store = MemKv::new();
        let other = store.connect().unwrap();
        put_all(&other, &[("a", "1")]);
        assert!(store.reader().unwrap().raw_contains(b"a").unwrap());

        store.destroy().unwrap();
        assert!(!other.reader().unwrap().raw_contains(b"a").unwrap());
    }

    #[test]
    fn test_new_store() {
        let store = MemKv::new();
        let reader = store.reader().unwrap();

        assert!(reader.raw_get(b"key1").unwrap().is_none());
        assert!(reader.raw_traverse().unwrap().first().unwrap().is_none());
    }

    #[test]
    fn test_read_locks_block_writer() {
        let store = MemKv::new();
        let reader = store.reader().unwrap();
        assert!(matches!(store.writer(), Err(StoreError::WriteLocked)));

        // Multiple readers may coexist.
        let _second = store.reader().unwrap();
        drop(reader);
    }

    #[test]
    fn test_writer_blocks_reader() {
        let store = MemKv::new();
        let writer = store.writer().unwrap();
        assert!(matches!(store.reader(), Err(StoreError::Inner(_))));
        drop(writer);
        assert!(store.reader().is_ok());
    }

    #[test]
    fn test_connected_writer_blocks_reader() {
        let store = MemKv::new();
        put_all(&store, &[("a", "1")]);
        let other = store.connect().unwrap();

        let writer = other.writer().unwrap();
        assert!(matches!(store.reader(), Err(StoreError::Inner(_))));
        writer.raw_commit().unwrap();
        assert!(store.reader().unwrap().raw_contains(b"a").unwrap());
    }

    #[test]
    fn test_drop_without_commit_discards() {
        let store = MemKv::new();
        put_all(&store, &[("a", "1")]);

        {
            let writer = store.writer().unwrap();
            writer.queue_raw_put(b"b", b"2").unwrap();
            writer.queue_raw_delete(b"a").unwrap();
            // dropped without commit
        }

        let reader = store.reader().unwrap();
        assert_eq!(reader.raw_get(b"a").unwrap().as_deref(), Some(b"1".as_slice()));
        assert!(reader.raw_get(b"b").unwrap().is_none());
    }

    #[test]
    fn test_read_cursor_navigation() {
        let store = MemKv::new();
        put_all(&store, &[("a", "1"), ("c", "3")]);

        let reader = store.reader().unwrap();
        let mut cursor = reader.raw_traverse().unwrap();
        let (k, _) = cursor.lower_bound(b"b").unwrap().unwrap();
        assert_eq!(k.as_ref(), b"c");
        let (k, _) = cursor.read_prev().unwrap().unwrap();
        assert_eq!(k.as_ref(), b"a");
        assert!(cursor.read_prev().unwrap().is_none());
        // Off the start, the cursor stays off until repositioned.
        assert!(cursor.read_next().unwrap().is_none());
        assert!(cursor.last().unwrap().is_some());
    }

    #[test]
    fn test_clear_then_put_in_one_tx() {
        let store = MemKv::new();
        put_all(&store, &[("a", "1"), ("b", "2")]);

        let writer = store.writer().unwrap();
        writer.queue_raw_clear().unwrap();
        writer.queue_raw_put(b"z", b"26").unwrap();
        assert!(writer.raw_get(b"a").unwrap().is_none());
        writer.raw_commit().unwrap();

        let reader = store.reader().unwrap();
        let mut cursor = reader.raw_traverse().unwrap();
        let (k, v) = cursor.first().unwrap().unwrap();
        assert_eq!((k.as_ref(), v.as_ref()), (b"z".as_slice(), b"26".as_slice()));
        assert!(cursor.read_next().unwrap().is_none());
    }
}
