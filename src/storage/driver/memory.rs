use crate::domain::{Entry, FullPath};
use crate::storage::MetaStore;

use std::collections::BTreeMap;
use std::io;
use tokio::sync::RwLock;

/// Metadata kept in a process-local map; lost on restart.
pub struct InMemoryMetaStore {
    entries: RwLock<BTreeMap<FullPath, Entry>>,
}

impl Default for InMemoryMetaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(FullPath::root(), Entry::new_dir(""));
        Self {
            entries: RwLock::new(entries),
        }
    }
}

fn is_descendant(path: &FullPath, dir: &FullPath) -> bool {
    path != dir && path.is_under(dir)
}

#[async_trait::async_trait]
impl MetaStore for InMemoryMetaStore {
    async fn find_entry(&self, path: &FullPath) -> io::Result<Option<Entry>> {
        Ok(self.entries.read().await.get(path).cloned())
    }

    async fn insert_entry(&self, path: &FullPath, mut entry: Entry) -> io::Result<Option<Entry>> {
        if path.is_root() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot replace the root directory",
            ));
        }
        entry.name = path.name().to_string();

        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(path) {
            if existing.is_directory != entry.is_directory {
                let kind = if existing.is_directory {
                    io::ErrorKind::IsADirectory
                } else {
                    io::ErrorKind::NotADirectory
                };
                return Err(io::Error::new(kind, path.to_string()));
            }
        }

        // mkdir -p for the parents
        let mut missing = Vec::new();
        let mut dir = path.parent();
        loop {
            match entries.get(&dir) {
                Some(parent) if parent.is_directory => break,
                Some(_) => return Err(io::Error::new(io::ErrorKind::NotADirectory, dir.to_string())),
                None => {
                    let next = dir.parent();
                    missing.push(dir);
                    dir = next;
                }
            }
        }
        for dir in missing {
            let name = dir.name().to_string();
            entries.insert(dir, Entry::new_dir(name));
        }

        Ok(entries.insert(path.clone(), entry))
    }

    async fn compare_and_swap(
        &self,
        path: &FullPath,
        expected: &Entry,
        mut entry: Entry,
    ) -> io::Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(path) {
            Some(slot) if *slot == *expected => {
                entry.name = path.name().to_string();
                *slot = entry;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_entry(&self, path: &FullPath, recursive: bool) -> io::Result<Vec<Entry>> {
        if path.is_root() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot delete the root directory",
            ));
        }
        let mut entries = self.entries.write().await;
        if !entries.contains_key(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()));
        }
        let descendants: Vec<FullPath> = entries
            .keys()
            .filter(|p| is_descendant(p, path))
            .cloned()
            .collect();
        if !descendants.is_empty() && !recursive {
            return Err(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                path.to_string(),
            ));
        }
        let mut removed = Vec::with_capacity(descendants.len() + 1);
        for p in descendants.iter().chain(std::iter::once(path)) {
            if let Some(entry) = entries.remove(p) {
                removed.push(entry);
            }
        }
        Ok(removed)
    }

    async fn list_entries(&self, dir: &FullPath) -> io::Result<Vec<Entry>> {
        let entries = self.entries.read().await;
        match entries.get(dir) {
            None => return Err(io::Error::new(io::ErrorKind::NotFound, dir.to_string())),
            Some(e) if !e.is_directory => {
                return Err(io::Error::new(io::ErrorKind::NotADirectory, dir.to_string()));
            }
            _ => {}
        }
        Ok(entries
            .iter()
            .filter(|(p, _)| !p.is_root() && p.parent() == *dir)
            .map(|(_, e)| e.clone())
            .collect())
    }
}
