use crate::admission::AdmissionController;
use crate::config::Config;
use crate::remote::{FilerClient, Hydrator, MountRegistry};
use crate::storage::{ChunkStore, MetaStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub admission: AdmissionController,
    pub meta: Arc<dyn MetaStore>,
    pub chunks: Arc<dyn ChunkStore>,
    pub mounts: Arc<MountRegistry>,
    pub hydrator: Hydrator,
    pub http: reqwest::Client,
    /// Parent of every request's cancellation token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        meta: Arc<dyn MetaStore>,
        chunks: Arc<dyn ChunkStore>,
        mounts: Arc<MountRegistry>,
        filer_client: Arc<dyn FilerClient>,
    ) -> Self {
        let admission = AdmissionController::new(config.concurrent_upload_limit)
            .with_wait_timeout(config.admission_timeout);
        let hydrator = Hydrator::new(filer_client, config.hydration_timeout);
        AppState {
            config: Arc::new(config),
            admission,
            meta,
            chunks,
            mounts,
            hydrator,
            http: reqwest::Client::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token for one request; cancelled at shutdown.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
