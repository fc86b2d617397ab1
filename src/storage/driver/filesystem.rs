use crate::domain::FileChunk;
use crate::storage::ChunkStore;
use crate::storage::paths::PathManager;

use bytes::Bytes;
use chrono::Utc;
use std::path::Path;
use tokio::{
    fs::{File, create_dir_all, read, remove_file},
    io::{self, AsyncWriteExt, BufWriter},
};

pub struct FilesystemChunkStore {
    path_manager: PathManager,
}

impl FilesystemChunkStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        FilesystemChunkStore {
            path_manager: PathManager::new(root.as_ref()),
        }
    }
}

#[async_trait::async_trait]
impl ChunkStore for FilesystemChunkStore {
    async fn write_chunk(&self, offset: u64, data: Bytes) -> io::Result<FileChunk> {
        let file_id = uuid::Uuid::new_v4().simple().to_string();
        let file_path = self.path_manager.chunk_path(&file_id)?;
        if let Some(parent) = file_path.parent() {
            create_dir_all(parent).await?;
        }
        let mut writer = BufWriter::new(File::create(&file_path).await?);
        writer.write_all(&data).await?;
        writer.flush().await?;

        Ok(FileChunk {
            file_id,
            offset,
            size: data.len() as u64,
            modified_ts_ns: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        })
    }

    async fn read_chunk(&self, chunk: &FileChunk) -> io::Result<Bytes> {
        let data = read(self.path_manager.chunk_path(&chunk.file_id)?).await?;
        Ok(Bytes::from(data))
    }

    async fn delete_chunk(&self, file_id: &str) -> io::Result<()> {
        match remove_file(self.path_manager.chunk_path(file_id)?).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Entry;
    use crate::storage::{PendingChunks, entry_stream};
    use futures::TryStreamExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_chunks_put_get_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FilesystemChunkStore::new(tmp.path());

        let chunk = store
            .write_chunk(0, Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(chunk.size, 5);
        assert_eq!(store.read_chunk(&chunk).await.unwrap(), "hello");

        store.delete_chunk(&chunk.file_id).await.unwrap();
        assert!(store.read_chunk(&chunk).await.is_err());
        // deleting twice is fine
        store.delete_chunk(&chunk.file_id).await.unwrap();
    }

    async fn read_back(store: Arc<dyn ChunkStore>, entry: &Entry) -> Vec<u8> {
        entry_stream(store, entry)
            .try_fold(Vec::new(), |mut acc, part| async move {
                acc.extend_from_slice(&part);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_filled_chunks_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(tmp.path()));
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();

        let mut pending = PendingChunks::new(store.clone());
        let size = pending.fill_from(data.as_slice(), 300).await.unwrap();
        assert_eq!(size, 1000);
        let chunks = pending.commit();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].offset, 900);
        assert_eq!(chunks[3].size, 100);

        let entry = Entry::new_file("f", chunks);
        assert_eq!(read_back(store, &entry).await, data);
    }

    #[tokio::test]
    async fn test_gaps_read_as_zeros() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(tmp.path()));
        let tail = store.write_chunk(4, Bytes::from_static(b"tail")).await.unwrap();

        let entry = Entry::new_file("f", vec![tail]);
        assert_eq!(read_back(store, &entry).await, b"\0\0\0\0tail");
    }

    #[tokio::test]
    async fn test_uncommitted_chunks_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(tmp.path()));

        let mut pending = PendingChunks::new(store.clone());
        pending.fill_from(&b"discarded"[..], 4).await.unwrap();
        let discarded = pending.chunks().to_vec();
        pending.discard().await;
        for chunk in &discarded {
            assert!(store.read_chunk(chunk).await.is_err());
        }

        let mut pending = PendingChunks::new(store.clone());
        pending.fill_from(&b"dropped"[..], 4).await.unwrap();
        let dropped = pending.chunks().to_vec();
        drop(pending);
        for _ in 0..100 {
            if store.read_chunk(&dropped[0]).await.is_err() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        for chunk in &dropped {
            assert!(store.read_chunk(chunk).await.is_err());
        }
    }
}
