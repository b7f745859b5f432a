//! Prefix-bounded enumeration over a store cursor.
//!
//! An [`Enumerator`] owns a cursor for the length of one enumeration. It
//! positions the cursor with [`position`], then steps it in the scan
//! direction, handing each entry to a callback until the cursor runs off the
//! keyspace, a key falls outside the prefix, or the callback breaks.
//!
//! Keys sharing a prefix are contiguous in the store's order, so the first
//! key outside the prefix ends the enumeration. Entries whose key is not
//! UTF-8 are logged and skipped.

use crate::{
    codec::{CodecHooks, decode_value},
    scan::{Direction, ScanRequest, owned, position},
};
use ordkv_store::{KvTraverse, StoreReadError};
use serde::de::DeserializeOwned;
use std::{marker::PhantomData, ops::ControlFlow};

/// A predicate over decoded values.
pub type Predicate<'a, T> = &'a dyn Fn(&T) -> bool;

/// A value that is read and decoded only when asked for.
///
/// Handed out by lazy enumerations. Unless the enumeration has a predicate,
/// which needs the value up front, nothing is decoded until
/// [`get`](Self::get) is called.
pub struct LazyValue<'a, T> {
    key: &'a str,
    load: &'a dyn Fn(&str) -> Option<T>,
    ready: Option<T>,
}

impl<T> core::fmt::Debug for LazyValue<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LazyValue")
            .field("key", &self.key)
            .field("loaded", &self.ready.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a, T> LazyValue<'a, T> {
    pub(crate) const fn new(
        key: &'a str,
        load: &'a dyn Fn(&str) -> Option<T>,
        ready: Option<T>,
    ) -> Self {
        Self { key, load, ready }
    }

    /// The key this value is stored under.
    pub const fn key(&self) -> &str {
        self.key
    }

    /// True if the value has already been decoded.
    pub const fn is_loaded(&self) -> bool {
        self.ready.is_some()
    }

    /// Read and decode the value. `None` if it is gone or does not decode.
    pub fn get(self) -> Option<T> {
        match self.ready {
            Some(value) => Some(value),
            None => (self.load)(self.key),
        }
    }
}

/// Drives a single enumeration over a cursor.
///
/// Consumed by each enumeration method, so the cursor is released when the
/// method returns, on every path.
pub struct Enumerator<'a, C, E> {
    cursor: C,
    request: ScanRequest<'a>,
    hooks: &'a dyn CodecHooks,
    _err: PhantomData<fn() -> E>,
}

impl<C, E> core::fmt::Debug for Enumerator<'_, C, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Enumerator").field("request", &self.request).finish_non_exhaustive()
    }
}

impl<'a, C, E> Enumerator<'a, C, E>
where
    C: KvTraverse<E>,
    E: StoreReadError,
{
    /// Create an enumerator over a fresh cursor.
    pub const fn new(cursor: C, request: ScanRequest<'a>, hooks: &'a dyn CodecHooks) -> Self {
        Self { cursor, request, hooks, _err: PhantomData }
    }

    /// Visit every key in scan order.
    pub fn keys<F>(self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        self.walk(|key, _| f(key))
    }

    /// Visit every key whose decoded value satisfies `predicate`. Entries
    /// that do not decode are skipped.
    pub fn keys_where<T, F>(self, predicate: Predicate<'_, T>, mut f: F) -> Result<(), E>
    where
        T: DeserializeOwned,
        F: FnMut(&str) -> ControlFlow<()>,
    {
        let hooks = self.hooks;
        self.walk(|key, raw| match decode_value::<T>(hooks, key, raw) {
            Some(value) if predicate(&value) => f(key),
            _ => ControlFlow::Continue(()),
        })
    }

    /// Visit every key with its decoded value. Entries that do not decode are
    /// skipped, as are entries rejected by `predicate` when one is given.
    pub fn keys_and_values<T, F>(self, predicate: Option<Predicate<'_, T>>, mut f: F) -> Result<(), E>
    where
        T: DeserializeOwned,
        F: FnMut(&str, T) -> ControlFlow<()>,
    {
        let hooks = self.hooks;
        self.walk(|key, raw| match decode_value::<T>(hooks, key, raw) {
            Some(value) if predicate.is_none_or(|p| p(&value)) => f(key, value),
            _ => ControlFlow::Continue(()),
        })
    }

    /// Visit every key with a [`LazyValue`] that calls `load` on demand.
    ///
    /// With a predicate, each value is decoded up front to test it, and the
    /// accepted value is handed over already loaded.
    pub fn keys_and_lazy_values<T, F>(
        self,
        load: &dyn Fn(&str) -> Option<T>,
        predicate: Option<Predicate<'_, T>>,
        mut f: F,
    ) -> Result<(), E>
    where
        T: DeserializeOwned,
        F: FnMut(&str, LazyValue<'_, T>) -> ControlFlow<()>,
    {
        let hooks = self.hooks;
        self.walk(|key, raw| {
            let Some(predicate) = predicate else {
                return f(key, LazyValue::new(key, load, None));
            };
            match decode_value::<T>(hooks, key, raw) {
                Some(value) if predicate(&value) => f(key, LazyValue::new(key, load, Some(value))),
                _ => ControlFlow::Continue(()),
            }
        })
    }

    /// The enumeration loop shared by every shape.
    fn walk<F>(mut self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&str, &[u8]) -> ControlFlow<()>,
    {
        let prefix = self.request.prefix().map(str::as_bytes);
        let mut entry = position(&mut self.cursor, &self.request)?;

        while let Some((key, value)) = entry {
            if let Some(prefix) = prefix
                && !key.starts_with(prefix)
            {
                break;
            }

            match std::str::from_utf8(&key) {
                Ok(key) => {
                    if visit(key, &value).is_break() {
                        break;
                    }
                }
                Err(err) => tracing::warn!(
                    target: "ordkv::enumerate",
                    key = %String::from_utf8_lossy(&key),
                    %err,
                    "skipping non-utf8 key"
                ),
            }

            entry = owned(match self.request.direction() {
                Direction::Forward => self.cursor.read_next()?,
                Direction::Backward => self.cursor.read_prev()?,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::IdentityHooks;
    use ordkv_store::{RawKv, RawKvRead, RawKvWrite, StoreError, mem::MemKv};

    fn seeded(entries: &[(&[u8], &[u8])]) -> MemKv {
        let store = MemKv::new();
        let writer = store.writer().unwrap();
        for (k, v) in entries {
            writer.queue_raw_put(k, v).unwrap();
        }
        writer.raw_commit().unwrap();
        store
    }

    fn collect_keys(store: &MemKv, request: ScanRequest<'_>) -> Vec<String> {
        let reader = store.reader().unwrap();
        let mut out = Vec::new();
        Enumerator::<_, StoreError>::new(reader.raw_traverse().unwrap(), request, &IdentityHooks)
            .keys(|k| {
                out.push(k.to_owned());
                ControlFlow::Continue(())
            })
            .unwrap();
        out
    }

    #[test]
    fn stops_at_prefix_boundary() {
        let store = seeded(&[(b"a:1", b"1"), (b"a:2", b"2"), (b"b:1", b"3"), (b"a", b"0")]);
        assert_eq!(collect_keys(&store, ScanRequest::new().with_prefix("a:")), ["a:1", "a:2"]);
        assert_eq!(
            collect_keys(&store, ScanRequest::new().with_prefix("a:").backward()),
            ["a:2", "a:1"]
        );
        assert!(collect_keys(&store, ScanRequest::new().with_prefix("c")).is_empty());
    }

    #[test]
    fn skips_non_utf8_keys() {
        let store = seeded(&[(b"k1", b"1"), (b"k\xff", b"2"), (b"k3", b"3")]);
        assert_eq!(collect_keys(&store, ScanRequest::new()), ["k1", "k3"]);
    }

    #[test]
    fn break_stops_after_current() {
        let store = seeded(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let reader = store.reader().unwrap();
        let mut seen = Vec::new();
        Enumerator::<_, StoreError>::new(
            reader.raw_traverse().unwrap(),
            ScanRequest::new(),
            &IdentityHooks,
        )
        .keys(|k| {
            seen.push(k.to_owned());
            if k == "b" { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
        })
        .unwrap();
        assert_eq!(seen, ["a", "b"]);
    }

    #[test]
    fn values_skip_undecodable_and_filter() {
        let store = seeded(&[(b"n:1", b"1"), (b"n:2", b"oops"), (b"n:3", b"3"), (b"n:4", b"4")]);
        let reader = store.reader().unwrap();
        let odd = |v: &u32| v % 2 == 1;

        let mut seen = Vec::new();
        Enumerator::<_, StoreError>::new(
            reader.raw_traverse().unwrap(),
            ScanRequest::new().with_prefix("n:"),
            &IdentityHooks,
        )
        .keys_and_values::<u32, _>(Some(&odd), |k, v| {
            seen.push((k.to_owned(), v));
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(seen, [("n:1".to_owned(), 1), ("n:3".to_owned(), 3)]);

        let mut keys = Vec::new();
        Enumerator::<_, StoreError>::new(
            reader.raw_traverse().unwrap(),
            ScanRequest::new().backward(),
            &IdentityHooks,
        )
        .keys_where::<u32, _>(&|v| *v > 1, |k| {
            keys.push(k.to_owned());
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(keys, ["n:4", "n:3"]);
    }

    #[test]
    fn lazy_values_load_on_demand() {
        use std::cell::Cell;

        let store = seeded(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let reader = store.reader().unwrap();
        let loads = Cell::new(0);
        let load = |key: &str| {
            loads.set(loads.get() + 1);
            let raw = reader.raw_get(key.as_bytes()).ok().flatten()?;
            decode_value::<u32>(&IdentityHooks, key, &raw)
        };

        let mut total = 0;
        Enumerator::<_, StoreError>::new(
            reader.raw_traverse().unwrap(),
            ScanRequest::new(),
            &IdentityHooks,
        )
        .keys_and_lazy_values::<u32, _>(&load, None, |k, lazy| {
            assert!(!lazy.is_loaded());
            if k != "b" {
                total += lazy.get().unwrap();
            }
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(total, 4);
        assert_eq!(loads.get(), 2);

        let mut loaded = Vec::new();
        Enumerator::<_, StoreError>::new(
            reader.raw_traverse().unwrap(),
            ScanRequest::new(),
            &IdentityHooks,
        )
        .keys_and_lazy_values::<u32, _>(&load, Some(&|v| *v >= 2), |_, lazy| {
            loaded.push(lazy.is_loaded());
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(loaded, [true, true]);
        assert_eq!(loads.get(), 2);
    }
}
