// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Snapshot fetcher against an in-process mock NVR.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use hapcam_core::{CameraRuntimeConfig, SnapshotEndpoint};
use hapcam_snapshot::{
    snapshot_queue, Enqueue, FetchError, FetchOutcome, SnapshotCache, SnapshotFetcher, SnapshotRequest,
    SnapshotService, SnapshotSettings,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const PLACEHOLDER: &[u8] = b"placeholder-jpeg";
// "admin:secret"
const BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

#[derive(Clone)]
struct MockNvr {
    hits: Arc<HashMap<&'static str, AtomicUsize>>,
}

impl MockNvr {
    fn new() -> Self {
        let hits = ["porch", "drive", "broken", "slow"].into_iter().map(|k| (k, AtomicUsize::new(0))).collect();
        Self { hits: Arc::new(hits) }
    }

    fn hits(&self, camera: &str) -> usize {
        self.hits.get(camera).map_or(0, |h| h.load(Ordering::SeqCst))
    }
}

async fn image(
    State(nvr): State<MockNvr>,
    Path(camera): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Vec<u8>) {
    if let Some(hits) = nvr.hits.get(camera.as_str()) {
        hits.fetch_add(1, Ordering::SeqCst);
    }
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(BASIC_AUTH) {
        return (StatusCode::UNAUTHORIZED, Vec::new());
    }
    match camera.as_str() {
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, b"nvr error".to_vec()),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, b"late".to_vec())
        },
        _ => {
            let width = params.get("w").cloned().unwrap_or_default();
            (StatusCode::OK, format!("jpeg:{camera}:{width}").into_bytes())
        },
    }
}

async fn start_mock_nvr() -> Option<(SocketAddr, MockNvr)> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(e) => panic!("Failed to bind mock NVR listener: {e}"),
    };
    let addr = listener.local_addr().unwrap();

    let nvr = MockNvr::new();
    let app = Router::new().route("/image/{camera}", get(image)).with_state(nvr.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Some((addr, nvr))
}

fn endpoint(addr: SocketAddr, camera: &str) -> SnapshotEndpoint {
    SnapshotEndpoint {
        url: format!("http://{addr}/image/{camera}"),
        username: Some("admin".to_string()),
        password: Some("secret".to_string()),
        width_param: "w".to_string(),
    }
}

fn settings(tmp: &tempfile::TempDir) -> SnapshotSettings {
    SnapshotSettings {
        cache_dir: tmp.path().join("cameras"),
        placeholder: tmp.path().join("snapshot.jpg"),
        debounce_ms: 30_000,
        transfer_timeout_ms: 500,
        failure_backoff_ms: 50,
        connect_timeout_ms: 1_000,
        queue_capacity: 16,
        default_width: 1380,
    }
}

fn fetcher(addr: SocketAddr, tmp: &tempfile::TempDir, cameras: &[&str]) -> (SnapshotFetcher, SnapshotCache) {
    fetcher_with(addr, tmp, cameras, settings(tmp))
}

fn fetcher_with(
    addr: SocketAddr,
    tmp: &tempfile::TempDir,
    cameras: &[&str],
    settings: SnapshotSettings,
) -> (SnapshotFetcher, SnapshotCache) {
    std::fs::write(tmp.path().join("snapshot.jpg"), PLACEHOLDER).unwrap();
    let cache = SnapshotCache::new(&settings.cache_dir, &settings.placeholder);
    cache.seed(cameras.iter().copied()).unwrap();

    let endpoints = cameras.iter().map(|c| ((*c).to_string(), endpoint(addr, c))).collect();
    (SnapshotFetcher::new(endpoints, cache.clone(), settings).unwrap(), cache)
}

#[tokio::test]
async fn test_fetch_then_debounce() {
    let Some((addr, nvr)) = start_mock_nvr().await else {
        eprintln!("Skipping test: cannot bind local listener");
        return;
    };
    let tmp = tempfile::tempdir().unwrap();
    let (mut fetcher, cache) = fetcher(addr, &tmp, &["porch"]);

    let first = fetcher.process(&SnapshotRequest::new("porch", 640)).await.unwrap();
    assert!(matches!(first, FetchOutcome::Fetched(_)));
    assert_eq!(cache.read("porch").unwrap(), b"jpeg:porch:640");
    assert!(!cache.partial_path_for("porch").exists());

    // Different width, same camera: still inside the debounce window.
    let second = fetcher.process(&SnapshotRequest::new("porch", 1380)).await.unwrap();
    assert_eq!(second, FetchOutcome::Debounced);
    assert_eq!(nvr.hits("porch"), 1);
}

#[tokio::test]
async fn test_fetch_again_after_debounce_window() {
    let Some((addr, nvr)) = start_mock_nvr().await else {
        eprintln!("Skipping test: cannot bind local listener");
        return;
    };
    let tmp = tempfile::tempdir().unwrap();
    let settings = SnapshotSettings { debounce_ms: 100, ..settings(&tmp) };
    let (mut fetcher, cache) = fetcher_with(addr, &tmp, &["porch"], settings);

    let first = fetcher.process(&SnapshotRequest::new("porch", 640)).await.unwrap();
    assert!(matches!(first, FetchOutcome::Fetched(_)));

    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = fetcher.process(&SnapshotRequest::new("porch", 1380)).await.unwrap();
    assert!(matches!(second, FetchOutcome::Fetched(_)));
    assert_eq!(nvr.hits("porch"), 2);
    assert_eq!(cache.read("porch").unwrap(), b"jpeg:porch:1380");
}

#[tokio::test]
async fn test_http_500_leaves_file_unchanged() {
    let Some((addr, nvr)) = start_mock_nvr().await else {
        eprintln!("Skipping test: cannot bind local listener");
        return;
    };
    let tmp = tempfile::tempdir().unwrap();
    let (mut fetcher, cache) = fetcher(addr, &tmp, &["broken"]);

    let err = fetcher.process(&SnapshotRequest::new("broken", 640)).await.unwrap_err();
    assert!(matches!(err, FetchError::Status(500)));
    assert_eq!(cache.read("broken").unwrap(), PLACEHOLDER);
    assert_eq!(nvr.hits("broken"), 1);
}

#[tokio::test]
async fn test_slow_transfer_times_out() {
    let Some((addr, _nvr)) = start_mock_nvr().await else {
        eprintln!("Skipping test: cannot bind local listener");
        return;
    };
    let tmp = tempfile::tempdir().unwrap();
    let (mut fetcher, cache) = fetcher(addr, &tmp, &["slow"]);

    let err = fetcher.process(&SnapshotRequest::new("slow", 640)).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(500)));
    assert_eq!(cache.read("slow").unwrap(), PLACEHOLDER);
}

#[tokio::test]
async fn test_unknown_camera_is_rejected() {
    let Some((addr, _nvr)) = start_mock_nvr().await else {
        eprintln!("Skipping test: cannot bind local listener");
        return;
    };
    let tmp = tempfile::tempdir().unwrap();
    let (mut fetcher, _cache) = fetcher(addr, &tmp, &["porch"]);

    let err = fetcher.process(&SnapshotRequest::new("garage", 640)).await.unwrap_err();
    assert!(matches!(err, FetchError::UnknownCamera(_)));
}

#[tokio::test]
async fn test_worker_continues_after_failure() {
    let Some((addr, nvr)) = start_mock_nvr().await else {
        eprintln!("Skipping test: cannot bind local listener");
        return;
    };
    let tmp = tempfile::tempdir().unwrap();
    let (fetcher, cache) = fetcher(addr, &tmp, &["broken", "drive"]);
    let (queue, receiver) = snapshot_queue(16);
    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(fetcher.run(receiver, shutdown.clone()));

    assert_eq!(queue.put(SnapshotRequest::new("broken", 640)), Enqueue::Queued);
    assert_eq!(queue.put(SnapshotRequest::new("drive", 640)), Enqueue::Queued);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while cache.read("drive").unwrap() == PLACEHOLDER && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(cache.read("drive").unwrap(), b"jpeg:drive:640");
    assert_eq!(cache.read("broken").unwrap(), PLACEHOLDER);
    assert_eq!(nvr.hits("broken"), 1);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), worker).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_service_collapses_request_storm() {
    let Some((addr, nvr)) = start_mock_nvr().await else {
        eprintln!("Skipping test: cannot bind local listener");
        return;
    };
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("snapshot.jpg"), PLACEHOLDER).unwrap();

    let mut porch = CameraRuntimeConfig::new("porch", "rtsp://nvr/porch");
    porch.snapshot = Some(endpoint(addr, "porch"));
    let doorbell = CameraRuntimeConfig::new("doorbell", "rtsp://nvr/doorbell");

    let service = SnapshotService::start(settings(&tmp), &[porch, doorbell]).unwrap();
    assert_eq!(service.read_snapshot("porch").unwrap(), PLACEHOLDER);
    assert_eq!(service.read_snapshot("doorbell").unwrap(), PLACEHOLDER);

    for _ in 0..20 {
        service.request_snapshot("porch", None);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while service.read_snapshot("porch").unwrap() == PLACEHOLDER && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(service.read_snapshot("porch").unwrap(), b"jpeg:porch:1380");

    // Let any straggling duplicates drain; they must all be debounced.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(nvr.hits("porch"), 1);

    assert!(tokio::task::spawn_blocking(move || service.shutdown(Duration::from_secs(5))).await.unwrap());
}
