//! Remote object backends.
//!
//! Only a local-directory driver ships here; it stands in for an object store
//! by laying objects out as `{root}/{bucket}/{path}`.

use super::RemoteError;
use crate::domain::{RemoteConf, RemoteStorageLocation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, BufReader};

/// Conf kind handled by [`LocalDirBackend`].
pub const LOCAL_KIND: &str = "local";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteObject {
    /// Object path inside the bucket, always starting with `/`.
    pub path: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub etag: String,
}

/// Object content, read as it is consumed.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// `Ok(None)` when the object does not exist.
    async fn read_object(
        &self,
        location: &RemoteStorageLocation,
    ) -> Result<Option<ObjectReader>, RemoteError>;

    /// Every object below `prefix` in `bucket`.
    async fn list_objects(&self, bucket: &str, prefix: &str)
    -> Result<Vec<RemoteObject>, RemoteError>;
}

/// Builds the driver for `conf.kind`.
pub fn open_backend(conf: &RemoteConf) -> Result<Box<dyn RemoteBackend>, RemoteError> {
    match conf.kind.as_str() {
        LOCAL_KIND => {
            let root = conf.properties.get("root").ok_or_else(|| {
                RemoteError::Backend(format!("remote `{}` has no `root` property", conf.name))
            })?;
            Ok(Box::new(LocalDirBackend::new(root)))
        }
        other => Err(RemoteError::UnsupportedBackend(other.to_string())),
    }
}

pub struct LocalDirBackend {
    root: PathBuf,
}

impl LocalDirBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, bucket: &str, path: &str) -> PathBuf {
        let mut out = self.root.join(bucket);
        for seg in path.split('/').filter(|s| !s.is_empty() && *s != "..") {
            out.push(seg);
        }
        out
    }

    fn etag_for(size: u64, mtime: &DateTime<Utc>) -> String {
        format!("{:x}-{:x}", mtime.timestamp_nanos_opt().unwrap_or_default(), size)
    }
}

fn backend_err(e: std::io::Error) -> RemoteError {
    RemoteError::Backend(e.to_string())
}

#[async_trait]
impl RemoteBackend for LocalDirBackend {
    async fn read_object(
        &self,
        location: &RemoteStorageLocation,
    ) -> Result<Option<ObjectReader>, RemoteError> {
        let path = self.path_for(&location.bucket, &location.path);
        match fs::File::open(path).await {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<RemoteObject>, RemoteError> {
        let bucket_root = self.root.join(bucket);
        let start = self.path_for(bucket, prefix);
        let mut out = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(backend_err(e)),
            };
            while let Some(item) = entries.next_entry().await.map_err(backend_err)? {
                let meta = item.metadata().await.map_err(backend_err)?;
                let path = item.path();
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&bucket_root) else {
                    continue;
                };
                let rel: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                let mtime: DateTime<Utc> = meta.modified().map_err(backend_err)?.into();
                out.push(RemoteObject {
                    path: format!("/{}", rel.join("/")),
                    size: meta.len(),
                    etag: Self::etag_for(meta.len(), &mtime),
                    mtime,
                });
            }
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }
}
