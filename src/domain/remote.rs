use super::full_path::FullPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A location triple inside a remote namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteStorageLocation {
    pub name: String,
    pub bucket: String,
    pub path: String,
}

/// Connection descriptor for a named remote backend.
///
/// Only the backend driver interprets `kind` and `properties`; everything else
/// passes the value through untouched.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConf {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

// properties may hold credentials
impl fmt::Debug for RemoteConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = format!("<{} redacted>", self.properties.len());
        f.debug_struct("RemoteConf")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("properties", &redacted)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountMapping {
    pub local_mounted_dir: FullPath,
    pub remote_mounted_location: RemoteStorageLocation,
}

impl MountMapping {
    pub fn overlaps(&self, other: &MountMapping) -> bool {
        self.local_mounted_dir.is_under(&other.local_mounted_dir)
            || other.local_mounted_dir.is_under(&self.local_mounted_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conf_debug_redacts_properties() {
        let conf = RemoteConf {
            name: "s3-1".into(),
            kind: "s3".into(),
            properties: BTreeMap::from([("secret_key".to_string(), "hunter2".to_string())]),
        };
        let out = format!("{conf:?}");
        assert!(out.contains("s3-1"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn test_mappings_overlap_on_segments() {
        let loc = RemoteStorageLocation {
            name: "r".into(),
            bucket: "b".into(),
            path: "/".into(),
        };
        let m = |dir: &str| MountMapping {
            local_mounted_dir: FullPath::new(dir),
            remote_mounted_location: loc.clone(),
        };
        assert!(m("/data").overlaps(&m("/data/sub")));
        assert!(m("/data/sub").overlaps(&m("/data")));
        assert!(!m("/data").overlaps(&m("/database")));
    }
}
