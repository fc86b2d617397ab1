use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Filer listening host
    #[arg(long, env = "FILER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Filer listening port
    #[arg(short, long, env = "FILER_PORT", default_value_t = 8888)]
    pub port: u16,

    /// Extra port serving only GET, HEAD and OPTIONS
    #[arg(long, env = "FILER_READONLY_PORT")]
    pub readonly_port: Option<u16>,

    /// Serve the main port in read-only mode
    #[arg(long, env = "FILER_READ_ONLY")]
    pub read_only: bool,

    /// Filer root path
    #[arg(long, env = "FILER_ROOTDIR", default_value = "/var/lib/filer-gate")]
    pub root: PathBuf,

    /// Limit of in-flight upload bytes, 0 means unlimited
    #[arg(long, env = "FILER_CONCURRENT_UPLOAD_LIMIT", default_value_t = 0)]
    pub concurrent_upload_limit: u64,

    /// Reject uploads that wait longer than this for admission
    #[arg(long, env = "FILER_ADMISSION_TIMEOUT_MS")]
    pub admission_timeout_ms: Option<u64>,

    /// Deadline of one hydration call
    #[arg(long, env = "FILER_HYDRATION_TIMEOUT_MS")]
    pub hydration_timeout_ms: Option<u64>,

    /// Largest chunk written to the chunk store
    #[arg(long, env = "FILER_MAX_CHUNK_SIZE", default_value_t = 4 * 1024 * 1024)]
    pub max_chunk_size: usize,

    /// JSON file with remote storages and mounts
    #[arg(long, env = "FILER_REMOTE_MOUNTS")]
    pub remote_mounts: Option<PathBuf>,

    /// Volume server base url for proxied chunk reads
    #[arg(long, env = "FILER_VOLUME_SERVER_URL")]
    pub volume_server_url: Option<String>,
}
