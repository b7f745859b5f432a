//! Store model traits and types.
//!
//! The model is split into three layers:
//!
//! - [`RawKv`] creates transactions.
//! - [`RawKvRead`] and [`RawKvWrite`] are the transactions themselves. They
//!   provide point access and hand out cursors.
//! - [`KvTraverse`] and [`KvTraverseMut`] are cursors. A cursor always has a
//!   position, and every positioning method returns the entry it landed on,
//!   or `None` if it moved past either end of the keyspace.
//!
//! Keys and values cross these traits as byte slices wrapped in [`Cow`], so
//! that backends may either lend out their own buffers or hand back owned
//! copies.
//!
//! [`Cow`]: std::borrow::Cow

mod error;
pub use error::{StoreError, StoreReadError, StoreResult};

mod traits;
pub use traits::{RawKv, RawKvRead, RawKvWrite};

mod traverse;
pub use traverse::{CursorPosition, KvTraverse, KvTraverseMut};

use std::borrow::Cow;

/// A raw value.
pub type RawValue<'a> = Cow<'a, [u8]>;

/// A raw key-value pair.
pub type RawKeyValue<'a> = (Cow<'a, [u8]>, RawValue<'a>);

/// An owned key-value pair, detached from the cursor that produced it.
pub type OwnedKeyValue = (Vec<u8>, Vec<u8>);
