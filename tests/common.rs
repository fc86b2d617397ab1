use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use filer_gate::api::create_router;
use filer_gate::config::Config;
use filer_gate::domain::{FullPath, MountMapping, RemoteConf, RemoteStorageLocation};
use filer_gate::remote::backend::LOCAL_KIND;
use filer_gate::remote::coordinator::Coordinator;
use filer_gate::remote::{FilerClient, MountRegistry, MountTable};
use filer_gate::storage::driver::filesystem::FilesystemChunkStore;
use filer_gate::storage::driver::memory::InMemoryMetaStore;
use filer_gate::storage::{ChunkStore, MetaStore};
use filer_gate::utils::state::AppState;
use http_body_util::BodyExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const REMOTE_BODY: &[u8] = b"hello from the remote side";

#[allow(dead_code)]
pub struct Fixture {
    pub root: TempDir,
    pub remote_root: TempDir,
    pub meta: Arc<dyn MetaStore>,
    pub chunks: Arc<dyn ChunkStore>,
    pub coordinator: Arc<Coordinator>,
    pub mounts: Arc<MountRegistry>,
    pub state: Arc<AppState>,
}

#[allow(dead_code)]
impl Fixture {
    pub fn router(&self) -> Router {
        create_router(self.state.clone(), false)
    }

    pub fn read_only_router(&self) -> Router {
        create_router(self.state.clone(), true)
    }

    pub fn mapping(&self) -> MountMapping {
        self.mounts.snapshot().mappings()[0].clone()
    }

    pub fn conf(&self) -> Arc<RemoteConf> {
        self.mounts.snapshot().conf("r").unwrap()
    }

    pub async fn pull(&self) -> usize {
        self.coordinator
            .pull_mount(&self.mapping(), &self.conf())
            .await
            .unwrap()
    }
}

/// A filer with `/data` mounted onto bucket `b` path `/backup` of a local
/// directory remote named `r`, holding `/backup/a/b.txt`.
#[allow(dead_code)]
pub fn fixture(config: Config) -> Fixture {
    fixture_with_client(config, None)
}

#[allow(dead_code)]
pub fn fixture_with_client(mut config: Config, client: Option<Arc<dyn FilerClient>>) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let remote_root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(remote_root.path().join("b/backup/a")).unwrap();
    std::fs::write(remote_root.path().join("b/backup/a/b.txt"), REMOTE_BODY).unwrap();

    let conf = RemoteConf {
        name: "r".into(),
        kind: LOCAL_KIND.into(),
        properties: BTreeMap::from([(
            "root".to_string(),
            remote_root.path().to_string_lossy().into_owned(),
        )]),
    };
    let mapping = MountMapping {
        local_mounted_dir: FullPath::new("/data"),
        remote_mounted_location: RemoteStorageLocation {
            name: "r".into(),
            bucket: "b".into(),
            path: "/backup".into(),
        },
    };
    let mounts = Arc::new(MountRegistry::new(
        MountTable::new(vec![mapping], vec![conf]).unwrap(),
    ));

    config.root_dir = root.path().to_path_buf();
    let meta: Arc<dyn MetaStore> = Arc::new(InMemoryMetaStore::new());
    let chunks: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(root.path()));
    let coordinator = Arc::new(Coordinator::new(
        meta.clone(),
        chunks.clone(),
        config.max_chunk_size,
    ));
    let client = client.unwrap_or_else(|| coordinator.clone() as Arc<dyn FilerClient>);
    let state = Arc::new(AppState::new(
        config,
        meta.clone(),
        chunks.clone(),
        mounts.clone(),
        client,
    ));
    Fixture {
        root,
        remote_root,
        meta,
        chunks,
        coordinator,
        mounts,
        state,
    }
}

#[allow(dead_code)]
pub fn small_chunks() -> Config {
    Config {
        max_chunk_size: 8,
        ..Config::default()
    }
}

#[allow(dead_code)]
pub fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap()
}

pub async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}
