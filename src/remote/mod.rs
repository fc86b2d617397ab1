//! Remote tiering bridge
//!
//! Submodules:
//! - `path`: pure translation between local mount paths and remote paths
//! - `mounts`: validated mount tables and their atomic replacement
//! - `fetcher`: hydration requests to the coordinator, with per-path dedup
//! - `coordinator`: in-process coordinator that materializes remote objects
//! - `backend`: remote object backends (local directory driver)
//! - `http_client`: coordinator client speaking JSON over HTTP
pub mod backend;
pub mod coordinator;
pub mod fetcher;
pub mod http_client;
pub mod mounts;
pub mod path;

pub use fetcher::{DownloadToLocalRequest, FilerClient, Hydrator, download_to_local};
pub use mounts::{MountConfigError, MountRegistry, MountTable};
pub use path::{InvalidMountPath, to_local_full_path, to_remote_location};

use std::time::Duration;
use thiserror::Error;

/// Failures on the hydration path. Cloneable so a single coordinator
/// result can be handed to every caller waiting on the same path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("coordinator rpc failed: {0}")]
    Rpc(String),

    #[error("coordinator returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("no remote mount covers {0}")]
    NotMounted(String),

    #[error("remote storage `{0}` is not configured")]
    UnknownStorage(String),

    #[error("remote storage kind `{0}` is not supported")]
    UnsupportedBackend(String),

    #[error("remote object {bucket}{path} does not exist")]
    ObjectMissing { bucket: String, path: String },

    #[error("remote backend error: {0}")]
    Backend(String),

    #[error("{0} changed while it was being hydrated")]
    Conflict(String),

    #[error("{0} is still remote-only after hydration")]
    Incomplete(String),

    #[error("hydration did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("hydration cancelled")]
    Cancelled,

    #[error(transparent)]
    InvalidMountPath(#[from] InvalidMountPath),
}
