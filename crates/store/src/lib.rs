//! Raw ordered key-value store model.
//!
//! This crate describes the storage engine that the `ordkv` facade sits on
//! top of. The engine is an ordered, persistent map from byte keys to byte
//! values, compared byte-wise. It offers point reads, queued writes with an
//! atomic commit, and cursors that can seek and step in both directions.
//!
//! # Quick Start
//!
//! ```ignore
//! use ordkv_store::{KvTraverse, RawKv, RawKvRead, RawKvWrite, StoreReadError};
//!
//! fn example<D: RawKv>(db: &D) -> Result<(), ordkv_store::StoreError> {
//!     let writer = db.writer()?;
//!     writer.queue_raw_put(b"user:1", b"alice").map_err(StoreReadError::into_store_error)?;
//!     writer.raw_commit().map_err(StoreReadError::into_store_error)?;
//!
//!     let reader = db.reader()?;
//!     let mut cursor = reader.raw_traverse().map_err(StoreReadError::into_store_error)?;
//!     let first = cursor.first().map_err(StoreReadError::into_store_error)?;
//!     Ok(())
//! }
//! ```
//!
//! # Trait Model
//!
//! ```text
//! RawKv                      ← Transaction factory
//!   ├─ reader() → RawKvRead      ← Read-only transactions
//!   │              └─ raw_traverse() → KvTraverse
//!   └─ writer() → RawKvWrite     ← Read-write transactions
//!                  └─ raw_traverse_mut() → KvTraverseMut
//! ```
//!
//! Writes are queued on the transaction and applied on
//! [`RawKvWrite::raw_commit`]. Dropping a write transaction without committing
//! discards the queued writes. Mutable cursors observe the transaction's own
//! queued writes merged over the committed state.
//!
//! Backends:
//!
//! - [`mem::MemKv`]: a `BTreeMap` behind a lock. Behind the `in-memory`
//!   feature.
//! - `ordkv-sled`: a persistent backend using sled.
//!
//! # Feature Flags
//!
//! - `in-memory`: Enables the [`mem`] module, providing an in-memory
//!   implementation of the store traits.
//! - `test-utils`: Enables the [`conformance`] module, which backends use to
//!   verify they implement the trait contracts correctly.

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

#[cfg(any(test, feature = "test-utils"))]
pub mod conformance;

mod connect;
pub use connect::StoreConnect;

pub mod model;
pub use model::{
    CursorPosition, KvTraverse, KvTraverseMut, OwnedKeyValue, RawKeyValue, RawKv, RawKvRead,
    RawKvWrite, RawValue, StoreError, StoreReadError, StoreResult,
};

pub mod ops;

#[cfg(any(test, feature = "in-memory"))]
pub mod mem;
