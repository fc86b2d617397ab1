pub mod entry;
pub mod full_path;
pub mod remote;

pub use entry::{Attributes, Entry, FileChunk, RemoteEntry, TAG_PREFIX};
pub use full_path::FullPath;
pub use remote::{MountMapping, RemoteConf, RemoteStorageLocation};
