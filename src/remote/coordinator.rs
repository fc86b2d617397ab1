//! In-process hydration coordinator.
//!
//! Serves [`FilerClient`] requests by streaming the remote object through
//! the backend named by the conf into the chunk store, then appending the
//! new chunks to the entry. The entry's remote descriptor is kept as is.
//!
//! The append only lands if the entry is unchanged since it was read. A
//! local write that replaced it in the meantime wins; the downloaded chunks
//! are dropped.

use super::backend::open_backend;
use super::fetcher::{DownloadToLocalRequest, FilerClient};
use super::{RemoteError, to_local_full_path};
use crate::domain::{Entry, FullPath, MountMapping, RemoteConf, RemoteEntry};
use crate::storage::{ChunkStore, MetaStore, PendingChunks};
use async_trait::async_trait;
use std::sync::Arc;

pub struct Coordinator {
    meta: Arc<dyn MetaStore>,
    chunks: Arc<dyn ChunkStore>,
    max_chunk_size: usize,
}

fn rpc(e: std::io::Error) -> RemoteError {
    RemoteError::Rpc(e.to_string())
}

impl Coordinator {
    pub fn new(meta: Arc<dyn MetaStore>, chunks: Arc<dyn ChunkStore>, max_chunk_size: usize) -> Self {
        Self {
            meta,
            chunks,
            max_chunk_size,
        }
    }

    /// Creates remote-only entries for the objects under a mount. Paths that
    /// already hold local bytes are left alone; remote-only entries whose
    /// remote descriptor changed are refreshed. Returns how many entries were
    /// written.
    pub async fn pull_mount(
        &self,
        mapping: &MountMapping,
        conf: &RemoteConf,
    ) -> Result<usize, RemoteError> {
        let backend = open_backend(conf)?;
        let base = &mapping.remote_mounted_location;
        let objects = backend.list_objects(&base.bucket, &base.path).await?;

        let mut written = 0;
        for object in objects {
            let path = to_local_full_path(&mapping.local_mounted_dir, base, &object.path)?;
            let remote = RemoteEntry {
                storage_name: conf.name.clone(),
                remote_size: object.size,
                remote_mtime: object.mtime,
                remote_etag: object.etag,
            };
            match self.meta.find_entry(&path).await.map_err(rpc)? {
                Some(existing) if existing.is_directory || !existing.chunks.is_empty() => continue,
                Some(existing) if existing.remote.as_ref() == Some(&remote) => continue,
                _ => {}
            }
            let entry = Entry::new_remote_only(path.name(), remote);
            if let Err(e) = self.meta.insert_entry(&path, entry).await {
                tracing::warn!("skip remote object {}: {}", path, e);
                continue;
            }
            written += 1;
        }
        tracing::info!(
            "pulled {} remote entries into {}",
            written,
            mapping.local_mounted_dir
        );
        Ok(written)
    }
}

#[async_trait]
impl FilerClient for Coordinator {
    async fn download_to_local(
        &self,
        remote_conf: &RemoteConf,
        request: DownloadToLocalRequest,
    ) -> Result<(), RemoteError> {
        let path = FullPath::new(&request.directory).child(&request.name);
        let entry = self
            .meta
            .find_entry(&path)
            .await
            .map_err(rpc)?
            .ok_or_else(|| RemoteError::Rpc(format!("entry {path} not found")))?;
        if !entry.is_remote_only() {
            tracing::debug!("{} is already local", path);
            return Ok(());
        }

        let backend = open_backend(remote_conf)?;
        let location = &request.remote_location;
        let reader = backend
            .read_object(location)
            .await?
            .ok_or_else(|| RemoteError::ObjectMissing {
                bucket: location.bucket.clone(),
                path: location.path.clone(),
            })?;
        let mut pending = PendingChunks::new(Arc::clone(&self.chunks));
        let size = pending
            .fill_from(reader, self.max_chunk_size)
            .await
            .map_err(|e| RemoteError::Backend(e.to_string()))?;

        let mut hydrated = entry.clone();
        hydrated.chunks.extend_from_slice(pending.chunks());
        if self
            .meta
            .compare_and_swap(&path, &entry, hydrated)
            .await
            .map_err(rpc)?
        {
            pending.commit();
            tracing::info!("hydrated {} ({} bytes)", path, size);
            return Ok(());
        }

        pending.discard().await;
        match self.meta.find_entry(&path).await.map_err(rpc)? {
            Some(current) if !current.is_remote_only() => {
                tracing::debug!("{} was written locally during hydration", path);
                Ok(())
            }
            _ => Err(RemoteError::Conflict(path.to_string())),
        }
    }
}
