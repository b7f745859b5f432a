//! Accessor task and handle.
//!
//! An [`Accessor`](crate::Accessor) can be moved onto a background task and
//! driven over a channel:
//!
//! - [`AccessorTask`] owns the accessor and applies requests in arrival order
//! - [`AccessorHandle`] is a cloneable, async front end for sending requests

mod handle;
pub use handle::AccessorHandle;

mod request;
pub use request::{AccessorRequest, Responder};

mod runner;
pub use runner::AccessorTask;
