//! Queued write operations.
//!
//! Write transactions do not touch committed state until they commit. Until
//! then their puts and deletes live in a [`QueuedOps`] set, which backends
//! consult to give reads made through the transaction a read-your-writes
//! view.

use bytes::Bytes;
use std::{collections::BTreeMap, ops::Bound};

/// A pair of key bounds, usable with both `BTreeMap::range` and engine range
/// scans.
pub type KeyBounds<'a> = (Bound<&'a [u8]>, Bound<&'a [u8]>);

/// A queued key-value operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedOp {
    /// Put the value at the key.
    Put(Bytes),
    /// Delete the key.
    Delete,
}

/// Result of looking a key up in the queued operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// The transaction has put this value.
    Put(&'a Bytes),
    /// The transaction has deleted the key, or cleared the store.
    Deleted,
    /// The transaction has not touched the key. Fall through to committed
    /// state.
    Untouched,
}

/// The set of operations queued on a write transaction.
///
/// Later operations on the same key replace earlier ones. A clear drops every
/// previously queued operation and hides all committed entries.
#[derive(Debug, Default, Clone)]
pub struct QueuedOps {
    cleared: bool,
    ops: BTreeMap<Bytes, QueuedOp>,
}

impl QueuedOps {
    /// Create an empty set.
    pub const fn new() -> Self {
        Self { cleared: false, ops: BTreeMap::new() }
    }

    /// True if the set contains a clear.
    pub const fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// True if committing this set would change nothing.
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.ops.is_empty()
    }

    /// Queue a put.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.insert(Bytes::copy_from_slice(key), QueuedOp::Put(Bytes::copy_from_slice(value)));
    }

    /// Queue a delete.
    pub fn delete(&mut self, key: &[u8]) {
        self.ops.insert(Bytes::copy_from_slice(key), QueuedOp::Delete);
    }

    /// Queue a clear of the whole store.
    pub fn clear(&mut self) {
        self.cleared = true;
        self.ops.clear();
    }

    /// Look a key up.
    pub fn lookup(&self, key: &[u8]) -> Lookup<'_> {
        match self.ops.get(key) {
            Some(QueuedOp::Put(value)) => Lookup::Put(value),
            Some(QueuedOp::Delete) => Lookup::Deleted,
            None if self.cleared => Lookup::Deleted,
            None => Lookup::Untouched,
        }
    }

    /// True if the committed entry at `key` is hidden by a queued operation.
    pub fn shadows(&self, key: &[u8]) -> bool {
        self.cleared || self.ops.contains_key(key)
    }

    /// Find the effective entry closest to the start of `bounds`.
    ///
    /// `committed` must yield the committed entries within `bounds`, in
    /// ascending order, or in descending order when `reverse` is set. Queued
    /// puts win over committed entries at the same key, and queued deletes
    /// hide them.
    pub fn merge<K, V, E, I>(
        &self,
        bounds: KeyBounds<'_>,
        reverse: bool,
        committed: I,
    ) -> Result<Option<(Bytes, Bytes)>, E>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
        I: IntoIterator<Item = Result<(K, V), E>>,
    {
        let puts = |(k, op): (&Bytes, &QueuedOp)| match op {
            QueuedOp::Put(v) => Some((k.clone(), v.clone())),
            QueuedOp::Delete => None,
        };
        let mut range = self.ops.range::<[u8], _>(bounds);
        let queued = if reverse { range.rev().find_map(puts) } else { range.find_map(puts) };

        let mut visible = None;
        if !self.cleared {
            for item in committed {
                let (k, v) = item?;
                if !self.ops.contains_key(k.as_ref()) {
                    visible = Some((
                        Bytes::copy_from_slice(k.as_ref()),
                        Bytes::copy_from_slice(v.as_ref()),
                    ));
                    break;
                }
            }
        }

        Ok(match (queued, visible) {
            (Some(q), Some(c)) => {
                let queued_first = if reverse { q.0 > c.0 } else { q.0 < c.0 };
                Some(if queued_first { q } else { c })
            }
            (q, c) => q.or(c),
        })
    }

    /// Split the set into its clear flag and its per-key operations, in key
    /// order.
    pub fn into_parts(self) -> (bool, BTreeMap<Bytes, QueuedOp>) {
        (self.cleared, self.ops)
    }
}
