//! Ergonomic handle for interacting with the accessor task.

use crate::{AccessorError, AccessorRequest, AccessorResult, ScanRequest};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};
use tracing::warn;

/// Handle for interacting with the accessor task.
///
/// This handle can be cloned and shared across tasks. Requests sent through
/// clones of one handle are applied in the order the task receives them.
#[derive(Clone, Debug)]
pub struct AccessorHandle {
    sender: mpsc::Sender<AccessorRequest>,
}

impl AccessorHandle {
    /// Create a new handle with the given sender.
    pub(crate) const fn new(sender: mpsc::Sender<AccessorRequest>) -> Self {
        Self { sender }
    }

    /// Send a request and wait for the response.
    async fn send<T>(
        &self,
        req: AccessorRequest,
        rx: oneshot::Receiver<AccessorResult<T>>,
    ) -> AccessorResult<T> {
        self.sender.send(req).await.map_err(|_| AccessorError::Cancelled)?;
        rx.await.map_err(|_| AccessorError::Cancelled)?
    }

    /// True once the task has stopped receiving requests.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    // ==========================================================================
    // Reads
    // ==========================================================================

    /// Read the value under `key`. `Ok(None)` when it is absent or does not
    /// decode as `T`.
    pub async fn value<T: DeserializeOwned>(&self, key: &str) -> AccessorResult<Option<T>> {
        let (resp, rx) = oneshot::channel();
        let value = self.send(AccessorRequest::Get { key: key.to_owned(), resp }, rx).await?;
        Ok(value.and_then(|value| serde_json::from_value(value).ok()))
    }

    /// True if a value is stored under `key`.
    pub async fn value_exists(&self, key: &str) -> AccessorResult<bool> {
        let (resp, rx) = oneshot::channel();
        self.send(AccessorRequest::Exists { key: key.to_owned(), resp }, rx).await
    }

    /// Collect the keys visited by `request`.
    pub async fn keys(&self, request: ScanRequest<'_>) -> AccessorResult<Vec<String>> {
        let (resp, rx) = oneshot::channel();
        self.send(AccessorRequest::Keys { request: request.to_owned_request(), resp }, rx).await
    }

    /// Every key, in ascending order.
    pub async fn all_keys(&self) -> AccessorResult<Vec<String>> {
        self.keys(ScanRequest::new()).await
    }

    // ==========================================================================
    // Writes
    // ==========================================================================

    /// Store `value` under `key` and wait for the write to land.
    pub async fn set_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> AccessorResult<()> {
        let value = to_value(key, value)?;
        let (resp, rx) = oneshot::channel();
        self.send(AccessorRequest::Set { key: key.to_owned(), value, resp: Some(resp) }, rx).await
    }

    /// Queue a write without waiting for it.
    ///
    /// The write is ordered after every request already queued. Failures
    /// are logged by the task.
    ///
    /// # Errors
    ///
    /// [`AccessorError::SendFailed`] if the channel is full, and
    /// [`AccessorError::Cancelled`] if the task has stopped.
    pub fn set_value_detached<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> AccessorResult<()> {
        let value = to_value(key, value)?;
        self.sender.try_send(AccessorRequest::Set { key: key.to_owned(), value, resp: None }).map_err(
            |err| match err {
                TrySendError::Full(_) => {
                    warn!(target: "ordkv::accessor", key, "accessor channel full, dropping write");
                    AccessorError::SendFailed
                }
                TrySendError::Closed(_) => AccessorError::Cancelled,
            },
        )
    }

    /// Remove the value under `key`.
    pub async fn remove_value(&self, key: &str) -> AccessorResult<()> {
        let (resp, rx) = oneshot::channel();
        self.send(AccessorRequest::Remove { key: key.to_owned(), resp }, rx).await
    }

    /// Remove every value whose key starts with `prefix`.
    pub async fn remove_all_values_with_prefix(&self, prefix: &str) -> AccessorResult<()> {
        let (resp, rx) = oneshot::channel();
        self.send(AccessorRequest::RemoveWithPrefix { prefix: prefix.to_owned(), resp }, rx).await
    }

    /// Release the store handle. Later requests are answered as if the
    /// store were empty.
    pub async fn close(&self) -> AccessorResult<()> {
        let (resp, rx) = oneshot::channel();
        self.send(AccessorRequest::Close { resp }, rx).await
    }
}

fn to_value<T: Serialize + ?Sized>(key: &str, value: &T) -> AccessorResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|source| AccessorError::Encode { key: key.to_owned(), source })
}
