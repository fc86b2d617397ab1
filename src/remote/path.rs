//! Translation between local mount paths and remote object paths.
//!
//! The local side is a [`FullPath`] below the mount's local directory; the
//! remote side is a path below the mount's remote base. Both directions work
//! on whole segments and reject anything outside the mount.

use crate::domain::{FullPath, RemoteStorageLocation};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("path `{path}` is not under mount prefix `{prefix}`")]
pub struct InvalidMountPath {
    pub path: String,
    pub prefix: String,
}

/// Maps `full_path` under `local_mounted_dir` to the same relative position
/// below `remote_mounted_location.path`. Backend name and bucket are kept.
pub fn to_remote_location(
    local_mounted_dir: &FullPath,
    remote_mounted_location: &RemoteStorageLocation,
    full_path: &FullPath,
) -> Result<RemoteStorageLocation, InvalidMountPath> {
    let suffix = full_path
        .strip_dir(local_mounted_dir)
        .ok_or_else(|| InvalidMountPath {
            path: full_path.to_string(),
            prefix: local_mounted_dir.to_string(),
        })?;
    let base = FullPath::new(&remote_mounted_location.path);
    Ok(RemoteStorageLocation {
        name: remote_mounted_location.name.clone(),
        bucket: remote_mounted_location.bucket.clone(),
        path: base.child(suffix).into(),
    })
}

/// Inverse of [`to_remote_location`]: strips the remote base from
/// `remote_path` and re-roots the remainder at `local_mounted_dir`.
pub fn to_local_full_path(
    local_mounted_dir: &FullPath,
    remote_mounted_location: &RemoteStorageLocation,
    remote_path: &str,
) -> Result<FullPath, InvalidMountPath> {
    let base = FullPath::new(&remote_mounted_location.path);
    let remote = FullPath::new(remote_path);
    let suffix = remote.strip_dir(&base).ok_or_else(|| InvalidMountPath {
        path: remote_path.to_string(),
        prefix: base.to_string(),
    })?;
    Ok(local_mounted_dir.child(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount() -> (FullPath, RemoteStorageLocation) {
        (
            FullPath::new("/data"),
            RemoteStorageLocation {
                name: "s3-1".into(),
                bucket: "b".into(),
                path: "/backup".into(),
            },
        )
    }

    #[test]
    fn test_round_trip() {
        let (dir, remote) = mount();
        let fp = FullPath::new("/data/a/b.txt");
        let loc = to_remote_location(&dir, &remote, &fp).unwrap();
        assert_eq!(
            loc,
            RemoteStorageLocation {
                name: "s3-1".into(),
                bucket: "b".into(),
                path: "/backup/a/b.txt".into(),
            }
        );
        let back = to_local_full_path(&dir, &remote, &loc.path).unwrap();
        assert_eq!(back, fp);
    }

    #[test]
    fn test_mount_dir_maps_to_remote_base() {
        let (dir, remote) = mount();
        let loc = to_remote_location(&dir, &remote, &dir).unwrap();
        assert_eq!(loc.path, "/backup");
        assert_eq!(to_local_full_path(&dir, &remote, "/backup").unwrap(), dir);
    }

    #[test]
    fn test_mismatched_prefix_is_rejected() {
        let (dir, remote) = mount();
        let err = to_remote_location(&dir, &remote, &FullPath::new("/other/a.txt")).unwrap_err();
        assert_eq!(err.prefix, "/data");
        assert_eq!(err.path, "/other/a.txt");

        // byte prefix but not a segment prefix
        assert!(to_remote_location(&dir, &remote, &FullPath::new("/database/x")).is_err());
        assert!(to_local_full_path(&dir, &remote, "/backups/x").is_err());
        assert!(to_local_full_path(&dir, &remote, "/elsewhere/x").is_err());
    }

    #[test]
    fn test_no_doubled_separators_at_boundary() {
        let dir = FullPath::new("/data/");
        let remote = RemoteStorageLocation {
            name: "s3-1".into(),
            bucket: "b".into(),
            path: "/backup/".into(),
        };
        let loc = to_remote_location(&dir, &remote, &FullPath::new("/data//a")).unwrap();
        assert_eq!(loc.path, "/backup/a");
        let again = to_remote_location(&dir, &remote, &FullPath::new("/data/a")).unwrap();
        assert_eq!(again, loc);
    }

    #[test]
    fn test_bucket_root_remote_path() {
        let dir = FullPath::new("/mnt");
        let remote = RemoteStorageLocation {
            name: "r".into(),
            bucket: "b".into(),
            path: String::new(),
        };
        let loc = to_remote_location(&dir, &remote, &FullPath::new("/mnt/x/y")).unwrap();
        assert_eq!(loc.path, "/x/y");
        assert_eq!(
            to_local_full_path(&dir, &remote, "x/y").unwrap(),
            FullPath::new("/mnt/x/y")
        );
    }
}
