use crate::domain::{Entry, FileChunk, FullPath};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

pub mod driver;
pub mod paths;

/// Filer metadata. Paths are always normalized [`FullPath`]s.
#[async_trait::async_trait]
pub trait MetaStore: Send + Sync {
    async fn find_entry(&self, path: &FullPath) -> io::Result<Option<Entry>>;
    /// Creates or replaces the entry at `path`, creating missing parent
    /// directories. Returns the replaced entry, if any.
    async fn insert_entry(&self, path: &FullPath, entry: Entry) -> io::Result<Option<Entry>>;
    /// Replaces the entry at `path` with `entry` only while it still equals
    /// `expected`. Returns `false`, leaving the store untouched, when the
    /// entry changed or disappeared since `expected` was read.
    async fn compare_and_swap(
        &self,
        path: &FullPath,
        expected: &Entry,
        entry: Entry,
    ) -> io::Result<bool>;
    /// Removes the entry (and its subtree when `recursive`), returning every
    /// removed entry.
    async fn delete_entry(&self, path: &FullPath, recursive: bool) -> io::Result<Vec<Entry>>;
    async fn list_entries(&self, dir: &FullPath) -> io::Result<Vec<Entry>>;
}

/// Local chunk bytes.
#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    async fn write_chunk(&self, offset: u64, data: Bytes) -> io::Result<FileChunk>;
    async fn read_chunk(&self, chunk: &FileChunk) -> io::Result<Bytes>;
    async fn delete_chunk(&self, file_id: &str) -> io::Result<()>;
}

/// Chunks written for an entry that is not stored yet.
///
/// Whoever fills it either hands the chunks over with [`commit`] once the
/// entry referencing them is in the meta store, or throws them away with
/// [`discard`]. Dropped without either, for instance when the request
/// writing them goes away, the chunks are deleted in the background.
///
/// [`commit`]: PendingChunks::commit
/// [`discard`]: PendingChunks::discard
pub struct PendingChunks {
    store: Arc<dyn ChunkStore>,
    chunks: Vec<FileChunk>,
    size: u64,
}

impl PendingChunks {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self {
            store,
            chunks: Vec::new(),
            size: 0,
        }
    }

    /// Reads `reader` to the end, storing it as chunks of at most
    /// `max_chunk_size` bytes. Only one chunk is buffered at a time.
    /// Returns the total size written so far.
    pub async fn fill_from<R>(&mut self, mut reader: R, max_chunk_size: usize) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let max = max_chunk_size.max(1);
        loop {
            let mut buf = BytesMut::with_capacity(max);
            while buf.len() < max {
                let want = (max - buf.len()) as u64;
                if (&mut reader).take(want).read_buf(&mut buf).await? == 0 {
                    break;
                }
            }
            if buf.is_empty() {
                break;
            }
            let full = buf.len() == max;
            let len = buf.len() as u64;
            let chunk = self.store.write_chunk(self.size, buf.freeze()).await?;
            self.chunks.push(chunk);
            self.size += len;
            if !full {
                break;
            }
        }
        Ok(self.size)
    }

    pub fn chunks(&self) -> &[FileChunk] {
        &self.chunks
    }

    /// The chunks now belong to a stored entry.
    pub fn commit(mut self) -> Vec<FileChunk> {
        std::mem::take(&mut self.chunks)
    }

    pub async fn discard(mut self) {
        let chunks = std::mem::take(&mut self.chunks);
        delete_chunks(self.store.as_ref(), &chunks).await;
    }
}

impl Drop for PendingChunks {
    fn drop(&mut self) {
        if self.chunks.is_empty() {
            return;
        }
        let chunks = std::mem::take(&mut self.chunks);
        let store = Arc::clone(&self.store);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { delete_chunks(store.as_ref(), &chunks).await });
            }
            Err(_) => tracing::warn!("leaking {} uncommitted chunks", chunks.len()),
        }
    }
}

/// Part of a file served from one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleSpan {
    pub start: u64,
    pub stop: u64,
    pub chunk: FileChunk,
}

/// Resolves overlapping chunks into the spans a reader sees, ordered by
/// offset. Where chunks overlap the most recently modified one wins.
pub fn visible_spans(chunks: &[FileChunk]) -> Vec<VisibleSpan> {
    let mut ordered: Vec<&FileChunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.modified_ts_ns);

    let mut spans: Vec<VisibleSpan> = Vec::new();
    for chunk in ordered {
        let (start, stop) = (chunk.offset, chunk.offset + chunk.size);
        if start == stop {
            continue;
        }
        let mut next = Vec::with_capacity(spans.len() + 2);
        for span in spans {
            if span.stop <= start || span.start >= stop {
                next.push(span);
                continue;
            }
            if span.start < start {
                next.push(VisibleSpan {
                    start: span.start,
                    stop: start,
                    chunk: span.chunk.clone(),
                });
            }
            if span.stop > stop {
                next.push(VisibleSpan {
                    start: stop,
                    stop: span.stop,
                    chunk: span.chunk,
                });
            }
        }
        next.push(VisibleSpan {
            start,
            stop,
            chunk: chunk.clone(),
        });
        spans = next;
    }
    spans.sort_by_key(|s| s.start);
    spans
}

const ZERO_FILL: u64 = 64 * 1024;

enum Piece {
    Zeros(usize),
    Span(VisibleSpan),
}

fn push_zeros(pieces: &mut Vec<Piece>, mut len: u64) {
    while len > 0 {
        let n = len.min(ZERO_FILL);
        pieces.push(Piece::Zeros(n as usize));
        len -= n;
    }
}

/// The local bytes of `entry` as a stream, reading one chunk at a time.
/// Gaps between chunks read as zeros.
pub fn entry_stream(
    store: Arc<dyn ChunkStore>,
    entry: &Entry,
) -> BoxStream<'static, io::Result<Bytes>> {
    let size = entry
        .chunks
        .iter()
        .map(|c| c.offset + c.size)
        .max()
        .unwrap_or(0);
    let mut pieces = Vec::new();
    let mut pos = 0u64;
    for span in visible_spans(&entry.chunks) {
        push_zeros(&mut pieces, span.start - pos);
        pos = span.stop;
        pieces.push(Piece::Span(span));
    }
    push_zeros(&mut pieces, size - pos);

    stream::iter(pieces)
        .then(move |piece| {
            let store = Arc::clone(&store);
            async move {
                match piece {
                    Piece::Zeros(n) => Ok(Bytes::from(vec![0u8; n])),
                    Piece::Span(span) => {
                        let data = store.read_chunk(&span.chunk).await?;
                        let from = (span.start - span.chunk.offset) as usize;
                        let to = (span.stop - span.chunk.offset) as usize;
                        if data.len() < to {
                            return Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                format!(
                                    "chunk {} holds {} bytes, expected {}",
                                    span.chunk.file_id,
                                    data.len(),
                                    span.chunk.size
                                ),
                            ));
                        }
                        Ok(data.slice(from..to))
                    }
                }
            }
        })
        .boxed()
}

/// Deletes chunks no longer referenced, logging failures instead of
/// returning them.
pub async fn delete_chunks(store: &dyn ChunkStore, chunks: &[FileChunk]) {
    for chunk in chunks {
        if let Err(e) = store.delete_chunk(&chunk.file_id).await {
            tracing::warn!("failed to delete chunk {}: {}", chunk.file_id, e);
        }
    }
}
