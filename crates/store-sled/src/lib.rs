//! Implementation of the ordkv raw store using sled as the underlying
//! engine.
//!
//! ## Notes on implementation
//!
//! This crate provides an implementation of the [`RawKv`] trait using a
//! single sled tree as the keyspace. The [`SledKv`] struct owns the database
//! and tree handles and hands out transactions. The [`DatabaseArguments`]
//! struct configures the engine: page cache size, background flush interval,
//! and whether commits flush synchronously.
//!
//! sled has no long-lived read transactions. Readers observe the tree as it
//! is at each call, so a cursor held across a commit may see entries written
//! after it was created. Writers queue their operations and apply them in a
//! single atomic [`sled::Batch`] on commit. Only one writer may be open at a
//! time per [`SledKv`] handle family.
//!
//! Rough Edges:
//! - The single-writer lock is per process. Two processes cannot open the
//!   same directory at once, since sled holds an exclusive file lock.
//! - A queued clear is committed by removing every committed key in the same
//!   batch, which costs a full key scan.

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use parking_lot::Mutex;
use std::{borrow::Cow, path::Path, sync::Arc};

mod connector;
pub use connector::SledConnector;

mod cursor;
pub use cursor::{SledCursor, SledCursorMut};

mod error;
pub use error::SledError;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod tx;
pub use tx::{SledRoTx, SledRwTx};

use ordkv_store::{RawKv, StoreError};

/// 1 KB in bytes
pub const KILOBYTE: u64 = 1024;
/// 1 MB in bytes
pub const MEGABYTE: u64 = KILOBYTE * 1024;

/// Default page cache size.
const DEFAULT_CACHE_CAPACITY: u64 = 256 * MEGABYTE;

/// Default background flush interval.
const DEFAULT_FLUSH_EVERY_MS: u64 = 500;

/// Name of the tree holding the keyspace when none is configured.
pub const DEFAULT_TREE: &str = "ordkv";

/// Arguments for database initialization.
#[derive(Clone, Debug)]
pub struct DatabaseArguments {
    /// Maximum size of the page cache, in bytes.
    cache_capacity: u64,
    /// Interval for the background flusher. `None` disables it, leaving
    /// flushes to [`Self::with_sync_on_commit`] or the engine's shutdown.
    flush_every_ms: Option<u64>,
    /// Flush to disk before a commit returns.
    ///
    /// When `false`, a commit is atomic and visible immediately, but may be
    /// lost on crash until the next background flush.
    sync_on_commit: bool,
    /// Engine tuning mode.
    mode: sled::Mode,
    /// Delete the database when the last handle drops.
    temporary: bool,
    /// Name of the tree holding the keyspace.
    tree: Cow<'static, str>,
}

impl Default for DatabaseArguments {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseArguments {
    /// Create new database arguments with default settings.
    pub const fn new() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            flush_every_ms: Some(DEFAULT_FLUSH_EVERY_MS),
            sync_on_commit: false,
            mode: sled::Mode::LowSpace,
            temporary: false,
            tree: Cow::Borrowed(DEFAULT_TREE),
        }
    }

    /// Sets the page cache size in bytes.
    pub const fn with_cache_capacity(mut self, cache_capacity: Option<u64>) -> Self {
        if let Some(cache_capacity) = cache_capacity {
            self.cache_capacity = cache_capacity;
        }
        self
    }

    /// Sets the background flush interval. `None` disables it.
    pub const fn with_flush_every_ms(mut self, flush_every_ms: Option<u64>) -> Self {
        self.flush_every_ms = flush_every_ms;
        self
    }

    /// Flush synchronously on every commit.
    pub const fn with_sync_on_commit(mut self, sync_on_commit: bool) -> Self {
        self.sync_on_commit = sync_on_commit;
        self
    }

    /// Favor throughput over disk usage.
    pub const fn with_high_throughput(mut self) -> Self {
        self.mode = sled::Mode::HighThroughput;
        self
    }

    /// Remove the database once the last handle to it is dropped.
    pub const fn with_temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    /// Sets the name of the tree holding the keyspace.
    pub fn with_tree(mut self, tree: impl Into<Cow<'static, str>>) -> Self {
        self.tree = tree.into();
        self
    }

    /// The configured tree name.
    pub fn tree(&self) -> &str {
        &self.tree
    }

    /// Open the database at `path` with the current arguments.
    pub fn open(self, path: &Path) -> Result<SledKv, SledError> {
        SledKv::open(path, self)
    }

    fn to_config(&self, path: &Path) -> sled::Config {
        sled::Config::new()
            .path(path)
            .cache_capacity(self.cache_capacity)
            .flush_every_ms(self.flush_every_ms)
            .mode(self.mode)
            .temporary(self.temporary)
    }
}

/// sled-backed store. Wraps a [`sled::Db`] and the tree holding the
/// keyspace, and implements the [`RawKv`] trait.
///
/// Cloning is cheap and yields another handle to the same database. All
/// clones share one writer lock.
#[derive(Clone)]
pub struct SledKv {
    db: sled::Db,
    tree: sled::Tree,
    write_lock: Arc<Mutex<()>>,
    sync_on_commit: bool,
}

impl core::fmt::Debug for SledKv {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SledKv")
            .field("tree", &String::from_utf8_lossy(&self.tree.name()))
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

impl SledKv {
    /// Opens the database at the specified path with the given arguments,
    /// creating it if it does not exist.
    pub fn open(path: &Path, args: DatabaseArguments) -> Result<Self, SledError> {
        let db = args.to_config(path).open()?;
        let tree = db.open_tree(args.tree.as_bytes())?;
        tracing::debug!(
            target: "ordkv::sled",
            path = %path.display(),
            tree = %args.tree,
            recovered = db.was_recovered(),
            "opened sled database"
        );
        Ok(Self {
            db,
            tree,
            write_lock: Arc::new(Mutex::new(())),
            sync_on_commit: args.sync_on_commit,
        })
    }

    /// Opens a throwaway database that is removed when the last handle
    /// drops.
    pub fn temporary() -> Result<Self, SledError> {
        let db = sled::Config::new().temporary(true).open()?;
        let tree = db.open_tree(DEFAULT_TREE)?;
        Ok(Self { db, tree, write_lock: Arc::new(Mutex::new(())), sync_on_commit: false })
    }

    /// Flush all dirty pages to disk, returning the number of bytes
    /// written.
    pub fn flush(&self) -> Result<usize, SledError> {
        self.db.flush().map_err(Into::into)
    }

    /// Number of entries in the keyspace. This is a full scan.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// True if the keyspace is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Size of the database on disk, in bytes.
    pub fn size_on_disk(&self) -> Result<u64, SledError> {
        self.db.size_on_disk().map_err(Into::into)
    }
}

impl RawKv for SledKv {
    type RoTx = SledRoTx;
    type RwTx = SledRwTx;

    fn reader(&self) -> Result<Self::RoTx, StoreError> {
        Ok(SledRoTx::new(self.tree.clone()))
    }

    fn writer(&self) -> Result<Self::RwTx, StoreError> {
        let guard = self.write_lock.try_lock_arc().ok_or(StoreError::WriteLocked)?;
        Ok(SledRwTx::new(self.tree.clone(), guard, self.sync_on_commit))
    }
}
