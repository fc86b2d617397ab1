mod common;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use chrono::Utc;
use common::{REMOTE_BODY, fixture, fixture_with_client, request, send, small_chunks};
use filer_gate::domain::{Entry, FullPath, RemoteConf, RemoteEntry};
use filer_gate::remote::{DownloadToLocalRequest, FilerClient, RemoteError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records the request and answers with a fixed result without touching
/// any entry.
struct StubClient {
    calls: AtomicUsize,
    outcome: Result<(), RemoteError>,
}

#[async_trait]
impl FilerClient for StubClient {
    async fn download_to_local(
        &self,
        remote_conf: &RemoteConf,
        request: DownloadToLocalRequest,
    ) -> Result<(), RemoteError> {
        assert_eq!(remote_conf.name, "r");
        assert_eq!(request.directory, "/data/a");
        assert_eq!(request.name, "b.txt");
        assert_eq!(request.remote_location.bucket, "b");
        assert_eq!(request.remote_location.path, "/backup/a/b.txt");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

fn stub(outcome: Result<(), RemoteError>) -> Arc<StubClient> {
    Arc::new(StubClient {
        calls: AtomicUsize::new(0),
        outcome,
    })
}

#[tokio::test]
async fn test_get_hydrates_remote_only_file() {
    let f = fixture(small_chunks());
    assert_eq!(f.pull().await, 1);
    let path = FullPath::new("/data/a/b.txt");
    let before = f.meta.find_entry(&path).await.unwrap().unwrap();
    assert!(before.is_remote_only());

    let router = f.router();
    let (status, headers, body) = send(&router, request("GET", "/data/a/b.txt", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, REMOTE_BODY);
    assert_eq!(headers[CONTENT_LENGTH], REMOTE_BODY.len().to_string().as_str());

    let after = f.meta.find_entry(&path).await.unwrap().unwrap();
    assert!(!after.is_remote_only());
    assert_eq!(after.remote, before.remote);
    assert_eq!(f.state.hydrator.in_flight(), 0);

    // served locally from now on, even with the remote copy gone
    std::fs::remove_file(f.remote_root.path().join("b/backup/a/b.txt")).unwrap();
    let (status, _, body) = send(&router, request("GET", "/data/a/b.txt", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, REMOTE_BODY);
}

#[tokio::test]
async fn test_get_hydrates_encoded_name() {
    let f = fixture(small_chunks());
    std::fs::write(
        f.remote_root.path().join("b/backup/a/my file.txt"),
        b"spaced remote",
    )
    .unwrap();
    assert_eq!(f.pull().await, 2);

    let (status, _, body) = send(
        &f.router(),
        request("GET", "/data/a/my%20file.txt", Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "spaced remote");
    let entry = f
        .meta
        .find_entry(&FullPath::new("/data/a/my file.txt"))
        .await
        .unwrap()
        .unwrap();
    assert!(!entry.is_remote_only());
}

#[tokio::test]
async fn test_head_hydrates_too() {
    let f = fixture(small_chunks());
    f.pull().await;
    let (status, headers, body) =
        send(&f.router(), request("HEAD", "/data/a/b.txt", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(headers[CONTENT_LENGTH], REMOTE_BODY.len().to_string().as_str());
    let entry = f
        .meta
        .find_entry(&FullPath::new("/data/a/b.txt"))
        .await
        .unwrap()
        .unwrap();
    assert!(!entry.is_remote_only());
}

#[tokio::test]
async fn test_listing_shows_remote_only_entries() {
    let f = fixture(small_chunks());
    f.pull().await;
    let (status, _, body) = send(&f.router(), request("GET", "/data/a", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    let listing: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let entry = &listing["entries"][0];
    assert_eq!(entry["name"], "b.txt");
    assert_eq!(entry["size"], REMOTE_BODY.len());
    assert_eq!(entry["remote_only"], true);
}

#[tokio::test]
async fn test_coordinator_error_is_surfaced() {
    let client = stub(Err(RemoteError::Status {
        code: 500,
        message: "backend unreachable".into(),
    }));
    let f = fixture_with_client(small_chunks(), Some(client.clone()));
    f.pull().await;

    let (status, _, body) = send(&f.router(), request("GET", "/data/a/b.txt", Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let err: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(err["error"].as_str().unwrap().contains("backend unreachable"));
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    let entry = f
        .meta
        .find_entry(&FullPath::new("/data/a/b.txt"))
        .await
        .unwrap()
        .unwrap();
    assert!(entry.is_remote_only());
}

#[tokio::test]
async fn test_still_remote_only_is_an_error() {
    // the coordinator claims success but stores nothing
    let client = stub(Ok(()));
    let f = fixture_with_client(small_chunks(), Some(client.clone()));
    f.pull().await;

    let (status, _, body) = send(&f.router(), request("GET", "/data/a/b.txt", Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body.is_empty());
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_only_outside_any_mount() {
    let client = stub(Ok(()));
    let f = fixture_with_client(small_chunks(), Some(client.clone()));
    let remote = RemoteEntry {
        storage_name: "r".into(),
        remote_size: 4,
        remote_mtime: Utc::now(),
        remote_etag: "e".into(),
    };
    f.meta
        .insert_entry(
            &FullPath::new("/database/x.bin"),
            Entry::new_remote_only("x.bin", remote),
        )
        .await
        .unwrap();

    let (status, _, _) = send(&f.router(), request("GET", "/database/x.bin", Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_local_write_shadows_remote_entry() {
    let f = fixture(small_chunks());
    f.pull().await;
    let router = f.router();
    send(&router, request("PUT", "/data/a/b.txt", "local")).await;
    let (status, _, body) = send(&router, request("GET", "/data/a/b.txt", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "local");
    // a later pull leaves the local file alone
    assert_eq!(f.pull().await, 0);
}
