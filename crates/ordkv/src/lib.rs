//! Serialized, typed access to an ordered key-value store.
//!
//! This crate layers a small application-facing API over the raw store
//! traits of [`ordkv_store`]:
//!
//! - [`Accessor`]: typed reads, writes and removals, all serialized through
//!   one lock per store handle. Values are JSON, optionally transformed by
//!   [`CodecHooks`] on the way to and from the store.
//! - [`ScanRequest`] and [`position`]: where an enumeration starts, given an
//!   optional prefix, an optional start key, and a [`Direction`].
//! - [`Enumerator`]: prefix-bounded enumeration of keys, keys with values,
//!   and keys with [`LazyValue`]s, optionally filtered by a predicate.
//! - [`AccessorTask`] and [`AccessorHandle`]: the same accessor driven from
//!   async code over a channel.
//! - [`AccessorBuilder`]: opens an accessor from code or from `ORDKV_*`
//!   environment variables.
//!
//! # Quick Start
//!
//! ```
//! use ordkv::{Accessor, MemKv, ScanRequest};
//! use std::ops::ControlFlow;
//!
//! let accessor = Accessor::new(MemKv::new());
//! for i in 1..=3u32 {
//!     accessor.set_value(&format!("item:{i}"), &i).unwrap();
//! }
//! accessor.set_value("other", &0u32).unwrap();
//!
//! let mut seen = Vec::new();
//! accessor.enumerate_keys_and_values::<u32, _>(
//!     ScanRequest::new().with_prefix("item:").backward(),
//!     |key, value| {
//!         seen.push((key.to_owned(), value));
//!         ControlFlow::Continue(())
//!     },
//! );
//! assert_eq!(seen[0], ("item:3".to_owned(), 3));
//! assert_eq!(seen.len(), 3);
//! ```
//!
//! # Failure model
//!
//! Reads never fail loudly. A missing key, an undecodable value, a closed
//! store and a backend read error all read as absent, and are logged. Writes
//! return [`AccessorError`].

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

mod accessor;
pub use accessor::Accessor;

pub mod builder;
pub use builder::{AccessorBuilder, StoreInstance};

pub mod codec;
pub use codec::{CodecHooks, FnHooks, IdentityHooks};

pub mod config;

mod enumerate;
pub use enumerate::{Enumerator, LazyValue, Predicate};

mod error;
pub use error::{AccessorError, AccessorResult};

pub mod scan;
pub use scan::{Direction, OwnedScanRequest, ScanRequest, position};

mod task;
pub use task::{AccessorHandle, AccessorRequest, AccessorTask, Responder};

pub use ordkv_sled::{DatabaseArguments, SledConnector, SledKv};
pub use ordkv_store::{StoreError, mem::MemKv};

