//! Hydration requests.
//!
//! [`download_to_local`] asks the coordinator, through an injected
//! [`FilerClient`], to materialize one remote object as local chunks. It
//! performs no retry; whatever the coordinator returns is handed back.
//!
//! [`Hydrator`] wraps it for the read path. Concurrent readers of the same
//! remote-only file share one coordinator call, which runs as its own task:
//! a reader that gives up, through its cancellation token or by being
//! dropped, only stops waiting. The call finishes or hits the optional
//! deadline on its own and then leaves the in-flight map, so the next reader
//! of that path starts afresh.

use super::RemoteError;
use crate::domain::{Entry, FullPath, RemoteConf, RemoteStorageLocation};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadToLocalRequest {
    pub directory: String,
    pub name: String,
    pub remote_location: RemoteStorageLocation,
}

/// Capability to reach the hydration coordinator.
#[async_trait]
pub trait FilerClient: Send + Sync {
    async fn download_to_local(
        &self,
        remote_conf: &RemoteConf,
        request: DownloadToLocalRequest,
    ) -> Result<(), RemoteError>;
}

pub async fn download_to_local(
    client: &dyn FilerClient,
    remote_conf: &RemoteConf,
    remote_location: &RemoteStorageLocation,
    parent: &FullPath,
    entry: &Entry,
) -> Result<(), RemoteError> {
    tracing::info!(
        "download {}/{}{} to {}",
        remote_location.name,
        remote_location.bucket,
        remote_location.path,
        parent.child(&entry.name)
    );
    let request = DownloadToLocalRequest {
        directory: parent.to_string(),
        name: entry.name.clone(),
        remote_location: remote_location.clone(),
    };
    client.download_to_local(remote_conf, request).await
}

type SharedCall = Shared<BoxFuture<'static, Result<(), RemoteError>>>;

#[derive(Clone)]
struct InFlight {
    id: u64,
    call: SharedCall,
}

type InFlightMap = Arc<Mutex<HashMap<FullPath, InFlight>>>;

#[derive(Clone)]
pub struct Hydrator {
    client: Arc<dyn FilerClient>,
    deadline: Option<Duration>,
    next_id: Arc<AtomicU64>,
    in_flight: InFlightMap,
}

impl Hydrator {
    pub fn new(client: Arc<dyn FilerClient>, deadline: Option<Duration>) -> Self {
        Self {
            client,
            deadline,
            next_id: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Hydrates `parent/entry.name`, joining a call already running for the
    /// same path instead of starting another one.
    pub async fn hydrate(
        &self,
        remote_conf: Arc<RemoteConf>,
        remote_location: RemoteStorageLocation,
        parent: FullPath,
        entry: Entry,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        let full_path = parent.child(&entry.name);
        let call = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match in_flight.get(&full_path) {
                Some(running) => {
                    tracing::debug!("join in-flight hydration of {}", full_path);
                    running.call.clone()
                }
                None => {
                    let started = self.start(
                        full_path.clone(),
                        remote_conf,
                        remote_location,
                        parent,
                        entry,
                    );
                    let call = started.call.clone();
                    in_flight.insert(full_path, started);
                    call
                }
            }
        };

        tokio::select! {
            res = call => res,
            _ = cancel.cancelled() => Err(RemoteError::Cancelled),
        }
    }

    /// Number of paths with a coordinator call outstanding.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Spawns the coordinator call. Called with the in-flight map locked, so
    /// the task cannot remove its entry before it is inserted.
    fn start(
        &self,
        full_path: FullPath,
        remote_conf: Arc<RemoteConf>,
        remote_location: RemoteStorageLocation,
        parent: FullPath,
        entry: Entry,
    ) -> InFlight {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let client = Arc::clone(&self.client);
        let deadline = self.deadline;
        let in_flight = Arc::clone(&self.in_flight);

        let task = tokio::spawn(async move {
            let _done = Done {
                in_flight,
                path: full_path,
                id,
            };
            let call = download_to_local(
                client.as_ref(),
                &remote_conf,
                &remote_location,
                &parent,
                &entry,
            );
            match deadline {
                Some(d) => tokio::time::timeout(d, call)
                    .await
                    .unwrap_or_else(|_| Err(RemoteError::DeadlineExceeded(d))),
                None => call.await,
            }
        });

        let call = async move {
            task.await
                .unwrap_or_else(|e| Err(RemoteError::Rpc(format!("hydration task failed: {e}"))))
        }
        .boxed()
        .shared();
        InFlight { id, call }
    }
}

/// Takes a finished call out of the in-flight map, also when the call
/// panicked.
struct Done {
    in_flight: InFlightMap,
    path: FullPath,
    id: u64,
}

impl Drop for Done {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight.get(&self.path).is_some_and(|running| running.id == self.id) {
            in_flight.remove(&self.path);
        }
    }
}
