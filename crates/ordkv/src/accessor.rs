//! The serialized, typed accessor.

use crate::{
    AccessorError, AccessorResult,
    codec::{CodecHooks, IdentityHooks, decode_value, encode_value},
    enumerate::{Enumerator, LazyValue, Predicate},
    scan::ScanRequest,
};
use bytes::Bytes;
use ordkv_store::{RawKv, RawKvRead, RawKvWrite, StoreConnect, StoreReadError};
use parking_lot::{ReentrantMutex, RwLock};
use serde::{Serialize, de::DeserializeOwned};
use std::{cell::RefCell, collections::BTreeMap, ops::ControlFlow, sync::Arc};
use tracing::{debug, warn};

type ReadError<S> = <<S as RawKv>::RoTx as RawKvRead>::Error;
type WriteError<S> = <<S as RawKv>::RwTx as RawKvRead>::Error;

/// Typed key-value access over a single store handle.
///
/// Every operation runs under one reentrant lock, so at most one operation
/// touches the store at a time, and operations issued by one thread apply in
/// issue order. Calls made from inside an enumeration callback on the same
/// thread re-enter the lock and run inline. Reads nested this way are
/// supported. Writes nested this way are not: depending on the backend they
/// fail with [`StoreError::WriteLocked`].
///
/// # Soft failure
///
/// After [`close`](Self::close), operations log a warning and do nothing.
/// Reads return `None`, empty collections, or `false`. Writes return
/// `Ok(())`. Read failures of any kind are logged and read as absent. Only
/// the write paths return errors.
///
/// # Values
///
/// Values are serialized to JSON, then passed through the installed
/// [`CodecHooks`] before being stored. See [`crate::codec`].
///
/// [`StoreError::WriteLocked`]: ordkv_store::StoreError::WriteLocked
pub struct Accessor<S> {
    store: ReentrantMutex<RefCell<Option<S>>>,
    hooks: RwLock<Arc<dyn CodecHooks>>,
}

impl<S> core::fmt::Debug for Accessor<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Accessor").finish_non_exhaustive()
    }
}

impl<S: RawKv> Accessor<S> {
    /// Wrap an open store, with identity hooks.
    pub fn new(store: S) -> Self {
        Self {
            store: ReentrantMutex::new(RefCell::new(Some(store))),
            hooks: RwLock::new(Arc::new(IdentityHooks)),
        }
    }

    /// Open a store through `connector`.
    pub fn open<C>(connector: &C) -> AccessorResult<Self>
    where
        C: StoreConnect<Store = S>,
    {
        let store = connector.connect().map_err(AccessorError::store)?;
        debug!(target: "ordkv::accessor", "opened store");
        Ok(Self::new(store))
    }

    /// Install codec hooks, replacing the current ones.
    #[must_use]
    pub fn with_hooks(self, hooks: impl CodecHooks + 'static) -> Self {
        self.set_hooks(Arc::new(hooks));
        self
    }

    /// Replace the codec hooks. Operations already running keep the hooks
    /// they started with.
    pub fn set_hooks(&self, hooks: Arc<dyn CodecHooks>) {
        *self.hooks.write() = hooks;
    }

    /// The current codec hooks.
    pub fn hooks(&self) -> Arc<dyn CodecHooks> {
        Arc::clone(&self.hooks.read())
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    /// Release the store handle. Idempotent.
    ///
    /// Ignored, with a warning, when called from inside an enumeration
    /// callback on this accessor.
    pub fn close(&self) {
        let guard = self.store.lock();
        let Ok(mut state) = guard.try_borrow_mut() else {
            warn!(target: "ordkv::accessor", "close requested while the store is in use, ignoring");
            return;
        };
        if state.take().is_some() {
            debug!(target: "ordkv::accessor", "closed store");
        }
    }

    /// True once the handle has been released.
    pub fn is_closed(&self) -> bool {
        self.store.lock().borrow().is_none()
    }

    /// Open the store again through `connector`, if it is closed. Does
    /// nothing while the store is open.
    pub fn reopen<C>(&self, connector: &C) -> AccessorResult<()>
    where
        C: StoreConnect<Store = S>,
    {
        let guard = self.store.lock();
        let Ok(mut state) = guard.try_borrow_mut() else {
            warn!(target: "ordkv::accessor", "reopen requested while the store is in use, ignoring");
            return Ok(());
        };
        if state.is_none() {
            *state = Some(connector.connect().map_err(AccessorError::store)?);
            debug!(target: "ordkv::accessor", "reopened store");
        }
        Ok(())
    }

    /// Close the store, then delete its persisted data.
    ///
    /// Fails with [`AccessorError::Busy`] when called from inside a callback
    /// of this accessor, since the store cannot be closed there. Nothing is
    /// deleted in that case.
    pub fn delete_from_disk<C>(&self, connector: &C) -> AccessorResult<()>
    where
        C: StoreConnect<Store = S>,
    {
        self.close();
        if !self.is_closed() {
            return Err(AccessorError::Busy { op: "delete_from_disk" });
        }
        connector.destroy().map_err(AccessorError::store)?;
        debug!(target: "ordkv::accessor", "deleted store from disk");
        Ok(())
    }

    // ==========================================================================
    // Serialization boundary
    // ==========================================================================

    /// Run `f` against the store under the lock. `None` if the store is
    /// closed.
    fn with_store<R>(&self, op: &'static str, f: impl FnOnce(&S) -> R) -> Option<R> {
        let guard = self.store.lock();
        let state = guard.borrow();
        let Some(store) = state.as_ref() else {
            warn!(target: "ordkv::accessor", op, "store is closed");
            return None;
        };
        Some(f(store))
    }

    /// Run `f` in a read transaction. Failures are logged and yield `None`.
    fn read<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&S::RoTx, &dyn CodecHooks) -> Result<R, ReadError<S>>,
    ) -> Option<R> {
        let hooks = self.hooks();
        self.with_store(op, |store| {
            let reader = store
                .reader()
                .inspect_err(|err| {
                    warn!(target: "ordkv::accessor", op, %err, "failed to open read transaction")
                })
                .ok()?;
            f(&reader, hooks.as_ref())
                .map_err(StoreReadError::into_store_error)
                .inspect_err(|err| warn!(target: "ordkv::accessor", op, %err, "read failed"))
                .ok()
        })
        .flatten()
    }

    /// Run `f` in a write transaction and commit it.
    fn write(
        &self,
        op: &'static str,
        f: impl FnOnce(&S::RwTx) -> Result<(), WriteError<S>>,
    ) -> AccessorResult<()> {
        let result = self.with_store(op, |store| {
            let writer = store.writer().map_err(|source| AccessorError::WriteFailure { op, source })?;
            f(&writer).map_err(|err| AccessorError::write(op, err))?;
            writer.raw_commit().map_err(|err| AccessorError::write(op, err))
        });
        match result {
            Some(Err(err)) => {
                warn!(target: "ordkv::accessor", op, %err, "write failed");
                Err(err)
            }
            Some(Ok(())) | None => Ok(()),
        }
    }

    /// Encode `entries` and store them in one transaction.
    fn put_all<K, T>(&self, op: &'static str, entries: impl IntoIterator<Item = (K, T)>) -> AccessorResult<()>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        let hooks = self.hooks();
        let encoded = entries
            .into_iter()
            .map(|(key, value)| {
                if key.as_ref().is_empty() {
                    return Err(AccessorError::EmptyKey);
                }
                let raw = encode_value(hooks.as_ref(), key.as_ref(), &value)?;
                Ok((key, raw))
            })
            .collect::<AccessorResult<Vec<_>>>()?;

        self.write(op, |writer| {
            encoded.iter().try_for_each(|(key, raw)| writer.queue_raw_put(key.as_ref().as_bytes(), raw))
        })
    }

    // ==========================================================================
    // Values
    // ==========================================================================

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Fails if `key` is empty, the value does not encode, or the store
    /// rejects the write.
    pub fn set_value<T>(&self, key: &str, value: &T) -> AccessorResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.put_all("set_value", [(key, value)])
    }

    /// Store every entry in one transaction. Nothing is written if any entry
    /// fails to encode.
    pub fn save_many<K, T>(&self, entries: &[(K, T)]) -> AccessorResult<()>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        self.put_all("save_many", entries.iter().map(|(k, v)| (k.as_ref(), v)))
    }

    /// Store every entry of a map-like collection in one transaction.
    pub fn add_entries<K, T, I>(&self, entries: I) -> AccessorResult<()>
    where
        K: AsRef<str>,
        T: Serialize,
        I: IntoIterator<Item = (K, T)>,
    {
        self.put_all("add_entries", entries)
    }

    /// Read and decode the value under `key`.
    pub fn value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read("value", |reader, hooks| {
            Ok(reader.raw_get(key.as_bytes())?.and_then(|raw| decode_value(hooks, key, &raw)))
        })
        .flatten()
    }

    /// Read and decode the values under `keys`, in order, from one read
    /// transaction.
    pub fn values<T, K>(&self, keys: &[K]) -> Vec<Option<T>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        self.read("values", |reader, hooks| {
            keys.iter()
                .map(|key| {
                    let key = key.as_ref();
                    Ok(reader.raw_get(key.as_bytes())?.and_then(|raw| decode_value(hooks, key, &raw)))
                })
                .collect()
        })
        .unwrap_or_else(|| keys.iter().map(|_| None).collect())
    }

    /// True if a value is stored under `key`. Does not decode it.
    pub fn value_exists(&self, key: &str) -> bool {
        self.read("value_exists", |reader, _| reader.raw_contains(key.as_bytes())).unwrap_or(false)
    }

    /// Read the bytes under `key`, passed through the decode hook but not
    /// deserialized.
    pub fn raw_value(&self, key: &str) -> Option<Bytes> {
        self.read("raw_value", |reader, hooks| {
            Ok(reader
                .raw_get(key.as_bytes())?
                .and_then(|raw| hooks.decode(key, Bytes::copy_from_slice(&raw))))
        })
        .flatten()
    }

    /// Store `bytes` under `key`, passed through the encode hook but not
    /// serialized.
    pub fn set_raw_value(&self, key: &str, bytes: impl Into<Bytes>) -> AccessorResult<()> {
        if key.is_empty() {
            return Err(AccessorError::EmptyKey);
        }
        let raw = self
            .hooks()
            .encode(key, bytes.into())
            .ok_or_else(|| AccessorError::HookRejected(key.to_owned()))?;
        self.write("set_raw_value", |writer| writer.queue_raw_put(key.as_bytes(), &raw))
    }

    // ==========================================================================
    // Removal
    // ==========================================================================

    /// Remove the value under `key`.
    pub fn remove_value(&self, key: &str) -> AccessorResult<()> {
        self.write("remove_value", |writer| writer.queue_raw_delete(key.as_bytes()))
    }

    /// Remove the values under `keys` in one transaction.
    pub fn remove_values<K: AsRef<str>>(&self, keys: &[K]) -> AccessorResult<()> {
        self.write("remove_values", |writer| {
            keys.iter().try_for_each(|key| writer.queue_raw_delete(key.as_ref().as_bytes()))
        })
    }

    /// Remove every value.
    pub fn remove_all_values(&self) -> AccessorResult<()> {
        self.write("remove_all_values", |writer| writer.queue_raw_clear())
    }

    /// Remove every value whose key starts with `prefix`. An empty prefix
    /// removes everything.
    ///
    /// Walks the prefix run forward with a write cursor, deleting each entry
    /// as it is visited.
    pub fn remove_all_values_with_prefix(&self, prefix: &str) -> AccessorResult<()> {
        self.write("remove_all_values_with_prefix", |writer| writer.clear_prefix(prefix.as_bytes()))
    }

    // ==========================================================================
    // Enumeration
    // ==========================================================================

    /// Every key, in ascending order.
    pub fn all_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.enumerate_keys(ScanRequest::new(), |key| {
            keys.push(key.to_owned());
            ControlFlow::Continue(())
        });
        keys
    }

    /// Keys whose decoded values satisfy `predicate`, in ascending order.
    pub fn keys_where<T, P>(&self, predicate: P) -> Vec<String>
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
    {
        let mut keys = Vec::new();
        self.enumerate_keys_where(ScanRequest::new(), predicate, |key| {
            keys.push(key.to_owned());
            ControlFlow::Continue(())
        });
        keys
    }

    /// Entries whose decoded values satisfy `predicate`, keyed by their
    /// stored key.
    pub fn values_where<T, P>(&self, predicate: P) -> BTreeMap<String, T>
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
    {
        let mut entries = BTreeMap::new();
        self.enumerate_keys_and_values_where(ScanRequest::new(), predicate, |key, value| {
            entries.insert(key.to_owned(), value);
            ControlFlow::Continue(())
        });
        entries
    }

    /// Visit keys in scan order.
    pub fn enumerate_keys<F>(&self, request: ScanRequest<'_>, f: F)
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        self.read("enumerate_keys", |reader, hooks| {
            Enumerator::new(reader.raw_traverse()?, request, hooks).keys(f)
        });
    }

    /// Visit keys in scan order whose decoded values satisfy `predicate`.
    pub fn enumerate_keys_where<T, P, F>(&self, request: ScanRequest<'_>, predicate: P, f: F)
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
        F: FnMut(&str) -> ControlFlow<()>,
    {
        self.read("enumerate_keys", |reader, hooks| {
            Enumerator::new(reader.raw_traverse()?, request, hooks).keys_where::<T, _>(&predicate, f)
        });
    }

    /// Visit keys and decoded values in scan order. Entries that do not
    /// decode are skipped.
    pub fn enumerate_keys_and_values<T, F>(&self, request: ScanRequest<'_>, f: F)
    where
        T: DeserializeOwned,
        F: FnMut(&str, T) -> ControlFlow<()>,
    {
        self.scan_values::<T, _>(request, None, f);
    }

    /// Visit keys and decoded values in scan order, keeping those whose
    /// values satisfy `predicate`.
    pub fn enumerate_keys_and_values_where<T, P, F>(
        &self,
        request: ScanRequest<'_>,
        predicate: P,
        f: F,
    ) where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
        F: FnMut(&str, T) -> ControlFlow<()>,
    {
        self.scan_values::<T, _>(request, Some(&predicate), f);
    }

    /// Visit keys in scan order, each with a [`LazyValue`] that reads and
    /// decodes the value only if asked.
    pub fn enumerate_keys_and_values_lazily<T, F>(&self, request: ScanRequest<'_>, f: F)
    where
        T: DeserializeOwned,
        F: FnMut(&str, LazyValue<'_, T>) -> ControlFlow<()>,
    {
        self.scan_lazy::<T, _>(request, None, f);
    }

    /// Lazy enumeration keeping entries whose values satisfy `predicate`.
    /// Each value is decoded to test it, so the [`LazyValue`]s handed out are
    /// already loaded.
    pub fn enumerate_keys_and_values_lazily_where<T, P, F>(
        &self,
        request: ScanRequest<'_>,
        predicate: P,
        f: F,
    ) where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
        F: FnMut(&str, LazyValue<'_, T>) -> ControlFlow<()>,
    {
        self.scan_lazy::<T, _>(request, Some(&predicate), f);
    }

    fn scan_values<T, F>(&self, request: ScanRequest<'_>, predicate: Option<Predicate<'_, T>>, f: F)
    where
        T: DeserializeOwned,
        F: FnMut(&str, T) -> ControlFlow<()>,
    {
        self.read("enumerate_keys_and_values", |reader, hooks| {
            Enumerator::new(reader.raw_traverse()?, request, hooks).keys_and_values(predicate, f)
        });
    }

    fn scan_lazy<T, F>(&self, request: ScanRequest<'_>, predicate: Option<Predicate<'_, T>>, f: F)
    where
        T: DeserializeOwned,
        F: FnMut(&str, LazyValue<'_, T>) -> ControlFlow<()>,
    {
        self.read("enumerate_keys_and_values_lazily", |reader, hooks| {
            let load = |key: &str| -> Option<T> {
                let raw = reader
                    .raw_get(key.as_bytes())
                    .inspect_err(|err| warn!(target: "ordkv::accessor", key, %err, "lazy read failed"))
                    .ok()
                    .flatten()?;
                decode_value(hooks, key, &raw)
            };
            Enumerator::new(reader.raw_traverse()?, request, hooks)
                .keys_and_lazy_values(&load, predicate, f)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordkv_store::mem::MemKv;

    #[test]
    fn closed_accessor_is_inert() {
        let accessor = Accessor::new(MemKv::new());
        accessor.set_value("a", &1).unwrap();
        accessor.close();
        accessor.close();
        assert!(accessor.is_closed());

        assert_eq!(accessor.value::<i32>("a"), None);
        assert!(!accessor.value_exists("a"));
        assert!(accessor.all_keys().is_empty());
        assert_eq!(accessor.values::<i32, _>(&["a", "b"]), [None, None]);
        accessor.set_value("b", &2).unwrap();
        accessor.remove_all_values().unwrap();
    }

    #[test]
    fn reopen_restores_access() {
        let store = MemKv::new();
        let accessor = Accessor::open(&store).unwrap();
        accessor.set_value("kept", "yes").unwrap();
        accessor.close();

        accessor.reopen(&store).unwrap();
        assert_eq!(accessor.value::<String>("kept").as_deref(), Some("yes"));
        // Reopening an open accessor changes nothing.
        accessor.reopen(&store).unwrap();
        assert!(!accessor.is_closed());
    }

    #[test]
    fn close_inside_callback_is_ignored() {
        let accessor = Accessor::new(MemKv::new());
        accessor.save_many(&[("a", 1), ("b", 2)]).unwrap();

        let mut seen = 0;
        accessor.enumerate_keys(ScanRequest::new(), |_| {
            accessor.close();
            seen += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(seen, 2);
        assert!(!accessor.is_closed());
    }

    #[test]
    fn delete_from_disk_inside_callback_fails() {
        let store = MemKv::new();
        let accessor = Accessor::open(&store).unwrap();
        accessor.save_many(&[("a", 1), ("b", 2)]).unwrap();

        let mut results = Vec::new();
        accessor.enumerate_keys(ScanRequest::new(), |_| {
            results.push(accessor.delete_from_disk(&store));
            ControlFlow::Continue(())
        });
        assert_eq!(results.len(), 2);
        assert!(
            results
                .iter()
                .all(|r| matches!(r, Err(AccessorError::Busy { op: "delete_from_disk" })))
        );
        assert!(!accessor.is_closed());
        assert_eq!(accessor.all_keys(), ["a", "b"]);
    }

    #[test]
    fn nested_reads_run_inline() {
        let accessor = Accessor::new(MemKv::new());
        accessor.save_many(&[("a", 10), ("b", 20)]).unwrap();

        let mut sum = 0;
        accessor.enumerate_keys(ScanRequest::new(), |key| {
            sum += accessor.value::<i32>(key).unwrap();
            ControlFlow::Continue(())
        });
        assert_eq!(sum, 30);
    }

    #[test]
    fn nested_write_fails_without_deadlock() {
        let accessor = Accessor::new(MemKv::new());
        accessor.set_value("a", &1).unwrap();

        let mut result = None;
        accessor.enumerate_keys(ScanRequest::new(), |_| {
            result = Some(accessor.set_value("b", &2));
            ControlFlow::Break(())
        });
        assert!(matches!(result, Some(Err(AccessorError::WriteFailure { .. }))));
    }

    #[test]
    fn empty_keys_are_rejected() {
        let accessor = Accessor::new(MemKv::new());
        assert!(matches!(accessor.set_value("", &1), Err(AccessorError::EmptyKey)));
        assert!(matches!(accessor.set_raw_value("", b"x".as_slice()), Err(AccessorError::EmptyKey)));
        assert!(accessor.all_keys().is_empty());
    }

    #[test]
    fn delete_from_disk_clears_store() {
        let store = MemKv::new();
        let accessor = Accessor::open(&store).unwrap();
        accessor.set_value("a", &1).unwrap();

        accessor.delete_from_disk(&store).unwrap();
        assert!(accessor.is_closed());

        accessor.reopen(&store).unwrap();
        assert!(accessor.all_keys().is_empty());
    }
}
