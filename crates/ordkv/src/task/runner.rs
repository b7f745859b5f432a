//! Accessor task runner.
//!
//! The [`AccessorTask`] receives requests over a single channel and applies
//! them one at a time, in arrival order. Store access is blocking, so each
//! request runs on the blocking pool while the task waits for it.

use crate::{Accessor, AccessorHandle, AccessorRequest, ScanRequest};
use ordkv_store::RawKv;
use serde_json::Value;
use std::{ops::ControlFlow, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Channel size for accessor requests.
const CHANNEL_SIZE: usize = 256;

/// The accessor task that processes requests.
///
/// Each request completes before the next is started, so every write is
/// visible to the requests after it. The task stops when the cancellation
/// token fires or every handle is dropped. A request already running when
/// the token fires is finished first. Requests still queued are dropped, and
/// their callers see [`AccessorError::Cancelled`].
///
/// [`AccessorError::Cancelled`]: crate::AccessorError::Cancelled
pub struct AccessorTask<S> {
    accessor: Arc<Accessor<S>>,
    receiver: mpsc::Receiver<AccessorRequest>,
    cancel_token: CancellationToken,
}

impl<S> std::fmt::Debug for AccessorTask<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorTask").finish_non_exhaustive()
    }
}

impl<S> AccessorTask<S>
where
    S: RawKv + Send + 'static,
{
    /// Create a new accessor task and return its handle.
    ///
    /// Pass an `Arc` to keep synchronous access to the accessor alongside
    /// the task.
    pub fn new(
        accessor: impl Into<Arc<Accessor<S>>>,
        cancel_token: CancellationToken,
    ) -> (Self, AccessorHandle) {
        let (sender, receiver) = mpsc::channel(CHANNEL_SIZE);
        let task = Self { accessor: accessor.into(), receiver, cancel_token };
        (task, AccessorHandle::new(sender))
    }

    /// Spawn the task and return the handle.
    ///
    /// The task will run until the cancellation token is triggered or the
    /// channel is closed.
    pub fn spawn(
        accessor: impl Into<Arc<Accessor<S>>>,
        cancel_token: CancellationToken,
    ) -> AccessorHandle {
        let (task, handle) = Self::new(accessor, cancel_token);
        tokio::spawn(task.run());
        handle
    }

    /// Run the task, processing requests until shutdown.
    #[instrument(skip(self), name = "accessor_task")]
    pub async fn run(mut self) {
        debug!(target: "ordkv::task", "Accessor task started");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    debug!(target: "ordkv::task", "Accessor task received cancellation signal");
                    break;
                }

                maybe_req = self.receiver.recv() => {
                    let Some(req) = maybe_req else {
                        debug!(target: "ordkv::task", "Accessor channel closed");
                        break;
                    };

                    let name = req.name();
                    let accessor = Arc::clone(&self.accessor);
                    let job = tokio::task::spawn_blocking(move || handle(&*accessor, req));
                    if let Err(err) = job.await {
                        warn!(
                            target: "ordkv::task",
                            request = name,
                            %err,
                            "Accessor request panicked"
                        );
                    }
                }
            }
        }

        self.receiver.close();
        debug!(target: "ordkv::task", "Accessor task shut down");
    }
}

/// Apply one request to the accessor and answer it.
fn handle<S: RawKv>(accessor: &Accessor<S>, req: AccessorRequest) {
    match req {
        AccessorRequest::Get { key, resp } => {
            let _ = resp.send(Ok(accessor.value::<Value>(&key)));
        }
        AccessorRequest::Exists { key, resp } => {
            let _ = resp.send(Ok(accessor.value_exists(&key)));
        }
        AccessorRequest::Set { key, value, resp } => {
            let result = accessor.set_value(&key, &value);
            match resp {
                Some(resp) => {
                    let _ = resp.send(result);
                }
                None => {
                    if let Err(err) = result {
                        warn!(target: "ordkv::task", %key, %err, "Detached write failed");
                    }
                }
            }
        }
        AccessorRequest::Remove { key, resp } => {
            let _ = resp.send(accessor.remove_value(&key));
        }
        AccessorRequest::RemoveWithPrefix { prefix, resp } => {
            let _ = resp.send(accessor.remove_all_values_with_prefix(&prefix));
        }
        AccessorRequest::Keys { request, resp } => {
            let mut keys = Vec::new();
            accessor.enumerate_keys(request.as_request(), |key| {
                keys.push(key.to_owned());
                ControlFlow::Continue(())
            });
            let _ = resp.send(Ok(keys));
        }
        AccessorRequest::Close { resp } => {
            accessor.close();
            let _ = resp.send(Ok(()));
        }
    }
}
