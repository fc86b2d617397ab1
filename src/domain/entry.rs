use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of extended attributes that are exposed as object tags.
pub const TAG_PREFIX: &str = "Seaweed-";

/// A locally stored piece of a file's bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChunk {
    pub file_id: String,
    pub offset: u64,
    pub size: u64,
    pub modified_ts_ns: i64,
}

/// Provenance of an entry mirrored from a remote backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub storage_name: String,
    pub remote_size: u64,
    pub remote_mtime: DateTime<Utc>,
    pub remote_etag: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub mtime: DateTime<Utc>,
    #[serde(default)]
    pub mime: String,
    pub file_mode: u32,
}

impl Attributes {
    pub fn file() -> Self {
        Self {
            mtime: Utc::now(),
            mime: String::new(),
            file_mode: 0o644,
        }
    }

    pub fn dir() -> Self {
        Self {
            mtime: Utc::now(),
            mime: String::new(),
            file_mode: 0o755,
        }
    }
}

/// A filer namespace node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub is_directory: bool,
    #[serde(default)]
    pub chunks: Vec<FileChunk>,
    #[serde(default)]
    pub remote: Option<RemoteEntry>,
    pub attributes: Attributes,
    #[serde(default)]
    pub extended: BTreeMap<String, String>,
}

impl Entry {
    pub fn new_file(name: impl Into<String>, chunks: Vec<FileChunk>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            chunks,
            remote: None,
            attributes: Attributes::file(),
            extended: BTreeMap::new(),
        }
    }

    pub fn new_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            chunks: Vec::new(),
            remote: None,
            attributes: Attributes::dir(),
            extended: BTreeMap::new(),
        }
    }

    /// An entry whose bytes exist only in the remote backend.
    pub fn new_remote_only(name: impl Into<String>, remote: RemoteEntry) -> Self {
        let mut entry = Self::new_file(name, Vec::new());
        entry.attributes.mtime = remote.remote_mtime;
        entry.remote = Some(remote);
        entry
    }

    /// True when the bytes must be hydrated before they can be served.
    pub fn is_remote_only(&self) -> bool {
        self.chunks.is_empty() && self.remote.as_ref().is_some_and(|r| r.remote_size > 0)
    }

    /// Logical file size: the end of the furthest local chunk, or the remote
    /// size when nothing is stored locally.
    pub fn file_size(&self) -> u64 {
        let local = self
            .chunks
            .iter()
            .map(|c| c.offset + c.size)
            .max()
            .unwrap_or(0);
        match &self.remote {
            Some(remote) if self.chunks.is_empty() => remote.remote_size,
            _ => local,
        }
    }

    pub fn tags(&self) -> impl Iterator<Item = (&String, &String)> {
        self.extended.iter().filter(|(k, _)| k.starts_with(TAG_PREFIX))
    }
}
