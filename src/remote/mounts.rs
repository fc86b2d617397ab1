use crate::domain::{FullPath, MountMapping, RemoteConf};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MountConfigError {
    #[error("mount {0} overlaps mount {1}")]
    Overlap(String, String),

    #[error("mount {dir} refers to unknown remote storage `{name}`")]
    UnknownStorage { dir: String, name: String },

    #[error("remote storage `{0}` is configured twice")]
    DuplicateStorage(String),

    #[error("failed to read mounts file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse mounts file: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk form of a mount table.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MountsFile {
    #[serde(default)]
    pub remotes: Vec<RemoteConf>,
    #[serde(default)]
    pub mounts: Vec<MountMapping>,
}

/// An immutable, validated set of mounts and the remote confs they use.
#[derive(Debug, Default)]
pub struct MountTable {
    mappings: Vec<MountMapping>,
    confs: HashMap<String, Arc<RemoteConf>>,
}

impl MountTable {
    pub fn new(
        mappings: Vec<MountMapping>,
        remotes: Vec<RemoteConf>,
    ) -> Result<Self, MountConfigError> {
        let mut confs = HashMap::new();
        for conf in remotes {
            let name = conf.name.clone();
            if confs.insert(name.clone(), Arc::new(conf)).is_some() {
                return Err(MountConfigError::DuplicateStorage(name));
            }
        }
        for (i, m) in mappings.iter().enumerate() {
            if !confs.contains_key(&m.remote_mounted_location.name) {
                return Err(MountConfigError::UnknownStorage {
                    dir: m.local_mounted_dir.to_string(),
                    name: m.remote_mounted_location.name.clone(),
                });
            }
            if let Some(other) = mappings[..i].iter().find(|o| o.overlaps(m)) {
                return Err(MountConfigError::Overlap(
                    m.local_mounted_dir.to_string(),
                    other.local_mounted_dir.to_string(),
                ));
            }
        }
        Ok(Self { mappings, confs })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MountConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let file: MountsFile = serde_json::from_str(&raw)?;
        Self::new(file.mounts, file.remotes)
    }

    /// The mount whose local directory contains `path`. Mounts never overlap,
    /// so at most one matches.
    pub fn find(&self, path: &FullPath) -> Option<&MountMapping> {
        self.mappings
            .iter()
            .find(|m| path.is_under(&m.local_mounted_dir))
    }

    pub fn conf(&self, name: &str) -> Option<Arc<RemoteConf>> {
        self.confs.get(name).cloned()
    }

    pub fn mappings(&self) -> &[MountMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Holds the live mount table. Readers take a snapshot; reconfiguration
/// replaces the whole table, so no reader ever sees a half-edited one.
#[derive(Debug, Default)]
pub struct MountRegistry {
    current: RwLock<Arc<MountTable>>,
}

impl MountRegistry {
    pub fn new(table: MountTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    pub fn snapshot(&self) -> Arc<MountTable> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Installs `table` and returns the one it replaced.
    pub fn replace(&self, table: MountTable) -> Arc<MountTable> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(table))
    }
}
