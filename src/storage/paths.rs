// PathManager maps chunk file ids to their location on disk.
//
// The layout under the root directory is:
//
//	<root>
//	└── chunks
//	    └── <first two characters of id>
//	        └── <id>
//
// Ids are generated by the chunk store itself, so they never contain
// separators; anything else is rejected before it reaches the filesystem.

use std::io;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct PathManager {
    root_path: PathBuf,
}

impl PathManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PathManager {
            root_path: root.into(),
        }
    }

    /// Returns the path to the root of the chunk files,
    /// (e.g. `<root>/chunks`).
    pub fn chunks_path(&self) -> PathBuf {
        self.root_path.join("chunks")
    }

    /// Returns the path to a single chunk file,
    /// (e.g. `<root>/chunks/<first two characters>/<id>`).
    pub fn chunk_path(&self, file_id: &str) -> io::Result<PathBuf> {
        let valid = file_id.len() >= 2
            && file_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid chunk id `{file_id}`"),
            ));
        }
        Ok(self.chunks_path().join(&file_id[..2]).join(file_id))
    }
}
