//! Request types for the accessor task.
//!
//! Values cross the channel as [`serde_json::Value`]. The task runs them
//! through the accessor's codec hooks on the way in and out, so the store
//! contents match what the synchronous API would have written.

use crate::{AccessorError, scan::OwnedScanRequest};
use serde_json::Value;
use tokio::sync::oneshot;

/// Response sender type alias that propagates Result types.
pub type Responder<T, E = AccessorError> = oneshot::Sender<Result<T, E>>;

/// Requests understood by the accessor task.
#[derive(Debug)]
pub enum AccessorRequest {
    /// Read the value under a key.
    Get {
        /// The key to read.
        key: String,
        /// The response channel.
        resp: Responder<Option<Value>>,
    },
    /// Check whether a key holds a value.
    Exists {
        /// The key to check.
        key: String,
        /// The response channel.
        resp: Responder<bool>,
    },
    /// Store a value under a key.
    Set {
        /// The key to write.
        key: String,
        /// The value to store.
        value: Value,
        /// The response channel. `None` for detached writes.
        resp: Option<Responder<()>>,
    },
    /// Remove the value under a key.
    Remove {
        /// The key to remove.
        key: String,
        /// The response channel.
        resp: Responder<()>,
    },
    /// Remove every value whose key starts with a prefix.
    RemoveWithPrefix {
        /// The prefix to clear.
        prefix: String,
        /// The response channel.
        resp: Responder<()>,
    },
    /// Collect the keys visited by a scan.
    Keys {
        /// The scan to run.
        request: OwnedScanRequest,
        /// The response channel.
        resp: Responder<Vec<String>>,
    },
    /// Release the store handle. The task keeps running.
    Close {
        /// The response channel.
        resp: Responder<()>,
    },
}

impl AccessorRequest {
    /// Short name of the request, for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::Exists { .. } => "exists",
            Self::Set { .. } => "set",
            Self::Remove { .. } => "remove",
            Self::RemoveWithPrefix { .. } => "remove_with_prefix",
            Self::Keys { .. } => "keys",
            Self::Close { .. } => "close",
        }
    }
}
