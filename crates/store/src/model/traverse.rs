//! Cursor traversal traits.

use super::{RawKeyValue, RawValue, StoreReadError};
use bytes::Bytes;
use std::{borrow::Cow, ops::Range};

/// The entry a cursor is positioned on.
///
/// Backends that produce owned entries park them here, so that positioning
/// methods can lend them out for the lifetime of the cursor borrow.
#[derive(Debug, Default, Clone)]
pub struct CursorPosition {
    current: Option<(Bytes, Bytes)>,
}

impl CursorPosition {
    /// An unpositioned cursor.
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// The key of the current entry, if any.
    pub const fn key(&self) -> Option<&Bytes> {
        match &self.current {
            Some((key, _)) => Some(key),
            None => None,
        }
    }

    /// Move onto `found`, or off the keyspace if it is `None`, and return the
    /// new current entry.
    pub fn land(&mut self, found: Option<(Bytes, Bytes)>) -> Option<RawKeyValue<'_>> {
        self.current = found;
        self.current.as_ref().map(|(k, v)| (Cow::Borrowed(k.as_ref()), Cow::Borrowed(v.as_ref())))
    }
}

/// Trait for traversing key-value pairs in the store.
///
/// Positioning follows the usual ordered-store cursor semantics. After any
/// call that returns `Ok(None)`, the cursor is past one end of the keyspace,
/// and its position is implementation-defined until it is repositioned with
/// [`first`], [`last`], [`exact`] or [`lower_bound`].
///
/// [`first`]: KvTraverse::first
/// [`last`]: KvTraverse::last
/// [`exact`]: KvTraverse::exact
/// [`lower_bound`]: KvTraverse::lower_bound
pub trait KvTraverse<E: StoreReadError> {
    /// Set position to the first key-value pair in the store, and return
    /// the KV pair.
    fn first<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Set position to the last key-value pair in the store, and return the
    /// KV pair.
    fn last<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Set the cursor to a specific key, and return the EXACT value if it
    /// exists.
    fn exact<'a>(&'a mut self, key: &[u8]) -> Result<Option<RawValue<'a>>, E>;

    /// Seek to the first key-value pair AT OR ABOVE the specified key, and
    /// return that KV pair.
    fn lower_bound<'a>(&'a mut self, key: &[u8]) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Advance the cursor, and return the key-value pair it lands on.
    ///
    /// Returning `Ok(None)` indicates the cursor is past the end of the
    /// store.
    fn read_next<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Move the cursor back, and return the key-value pair it lands on.
    ///
    /// Returning `Ok(None)` indicates the cursor is before the start of the
    /// store.
    fn read_prev<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;
}

/// Trait for traversing key-value pairs with mutation capabilities.
pub trait KvTraverseMut<E: StoreReadError>: KvTraverse<E> {
    /// Delete the key-value pair the cursor is positioned on.
    ///
    /// The cursor keeps its position, so a following [`read_next`] lands on
    /// the entry after the deleted one.
    ///
    /// [`read_next`]: KvTraverse::read_next
    fn delete_current(&mut self) -> Result<(), E>;

    /// Delete a range of key-value pairs (exclusive end).
    fn delete_range(&mut self, range: Range<&[u8]>) -> Result<(), E> {
        let Some((key, _)) = self.lower_bound(range.start)? else {
            return Ok(());
        };
        if key.as_ref() >= range.end {
            return Ok(());
        }
        self.delete_current()?;

        while let Some((key, _)) = self.read_next()? {
            if key.as_ref() >= range.end {
                break;
            }
            self.delete_current()?;
        }
        Ok(())
    }

    /// Delete every key-value pair whose key starts with `prefix`.
    ///
    /// Walks forward from the prefix, deleting the current entry and
    /// stepping until the first key outside the prefix. An empty prefix
    /// deletes everything.
    fn delete_prefix(&mut self, prefix: &[u8]) -> Result<(), E> {
        let start = if prefix.is_empty() { self.first()? } else { self.lower_bound(prefix)? };
        let Some((key, _)) = start else {
            return Ok(());
        };
        if !key.starts_with(prefix) {
            return Ok(());
        }
        self.delete_current()?;

        while let Some((key, _)) = self.read_next()? {
            if !key.starts_with(prefix) {
                break;
            }
            self.delete_current()?;
        }
        Ok(())
    }
}
