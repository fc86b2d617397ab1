//! Normalized absolute filer paths.
//!
//! Every path handed to the metadata store, the mount table or the path
//! translator goes through [`FullPath::new`], so prefix checks can work on
//! whole segments instead of raw bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FullPath(String);

impl FullPath {
    pub fn root() -> Self {
        FullPath("/".to_string())
    }

    /// Builds a path with a leading `/`, no empty segments and no trailing
    /// `/` (except for the root itself).
    pub fn new(raw: impl AsRef<str>) -> Self {
        let parts: Vec<&str> = raw
            .as_ref()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        FullPath(format!("/{}", parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Appends one or more segments. Leading, trailing and repeated
    /// separators in `name` are dropped, so `child("")` is the identity.
    pub fn child(&self, name: &str) -> FullPath {
        let suffix: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();
        if suffix.is_empty() {
            return self.clone();
        }
        if self.is_root() {
            FullPath(format!("/{}", suffix.join("/")))
        } else {
            FullPath(format!("{}/{}", self.0, suffix.join("/")))
        }
    }

    /// Splits into the parent directory and the leaf name. The root has an
    /// empty name and is its own parent.
    pub fn dir_and_name(&self) -> (FullPath, &str) {
        match self.0.rfind('/') {
            Some(0) => (FullPath::root(), &self.0[1..]),
            Some(n) => (FullPath(self.0[..n].to_string()), &self.0[n + 1..]),
            None => (FullPath::root(), self.0.as_str()),
        }
    }

    pub fn parent(&self) -> FullPath {
        self.dir_and_name().0
    }

    pub fn name(&self) -> &str {
        self.dir_and_name().1
    }

    /// Returns the part of `self` below `dir` (without a leading `/`), or
    /// `None` when `self` is not `dir` or one of its descendants.
    /// `/database` is not under `/data`.
    pub fn strip_dir(&self, dir: &FullPath) -> Option<&str> {
        if dir.is_root() {
            return Some(&self.0[1..]);
        }
        let rest = self.0.strip_prefix(dir.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }

    pub fn is_under(&self, dir: &FullPath) -> bool {
        self.strip_dir(dir).is_some()
    }
}

impl fmt::Display for FullPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FullPath {
    fn from(value: String) -> Self {
        FullPath::new(value)
    }
}

impl From<&str> for FullPath {
    fn from(value: &str) -> Self {
        FullPath::new(value)
    }
}

impl From<FullPath> for String {
    fn from(value: FullPath) -> Self {
        value.0
    }
}
