use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub readonly_port: Option<u16>,
    pub read_only: bool,
    pub root_dir: PathBuf,
    /// Bytes; 0 disables admission control.
    pub concurrent_upload_limit: u64,
    pub admission_timeout: Option<Duration>,
    pub hydration_timeout: Option<Duration>,
    pub max_chunk_size: usize,
    pub remote_mounts: Option<PathBuf>,
    pub volume_server_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8888,
            readonly_port: None,
            read_only: false,
            root_dir: PathBuf::from("/var/lib/filer-gate"),
            concurrent_upload_limit: 0,
            admission_timeout: None,
            hydration_timeout: None,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            remote_mounts: None,
            volume_server_url: None,
        }
    }
}
