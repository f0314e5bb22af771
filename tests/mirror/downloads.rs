use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use axum::http::StatusCode;
use pypack_mirror::app::client::ClientConfig;

use crate::support::{
    client_config, closed_addr, file_body, get_with, spawn_origin, trickle_body, Mirror,
};

#[tokio::test]
async fn test_first_download_streams_then_redirects() {
    // Test that a miss streams the origin body and a later request redirects to storage
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;
    let path = origin.packs_path("foo", "files", "foo-2.0.tar.gz");
    let expected = file_body("foo-2.0.tar.gz");

    let (status, headers, body) = mirror.get(&path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), expected.as_slice());
    assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/x-tar");
    assert_eq!(
        headers.get(CONTENT_LENGTH).unwrap().to_str().unwrap(),
        expected.len().to_string()
    );

    let stored = std::fs::read(mirror.storage.path().join("foo/foo-2.0.tar.gz")).unwrap();
    assert_eq!(stored, expected);
    assert_eq!(mirror.raw_entries("foo"), vec!["foo-2.0.tar.gz"]);

    let (status, headers, _) = mirror.get(&path).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(LOCATION).unwrap(), "/storage/foo/foo-2.0.tar.gz");
    assert_eq!(origin.file_hits(), 1);
}

#[tokio::test]
async fn test_locally_stored_file_is_never_fetched() {
    // Test that an uploaded artifact wins over its origin URL
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;
    mirror.put("foo", "foo-1.0.tar.gz", b"local", None).await;

    let (status, headers, _) = mirror
        .get(&origin.packs_path("foo", "files", "foo-1.0.tar.gz"))
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(LOCATION).unwrap(), "/storage/foo/foo-1.0.tar.gz");
    assert_eq!(origin.file_hits(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_downloads_fetch_once() {
    // Test that simultaneous requests for one artifact share a single origin fetch
    let origin = spawn_origin().await;
    let mirror = Arc::new(Mirror::new(Some(origin.index_url()), None).await);
    let path = origin.packs_path("foo", "slow", "foo-3.0.tar.gz");
    let expected = file_body("foo-3.0.tar.gz");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = mirror.router.clone();
        let path = path.clone();
        handles.push(tokio::spawn(async move { get_with(router, &path).await }));
    }

    let mut streamed = 0;
    for handle in handles {
        let (status, headers, body) = handle.await.unwrap();
        match status {
            StatusCode::OK => {
                streamed += 1;
                assert_eq!(body.as_ref(), expected.as_slice());
            }
            StatusCode::SEE_OTHER => {
                assert_eq!(headers.get(LOCATION).unwrap(), "/storage/foo/foo-3.0.tar.gz");
            }
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(streamed, 1);
    assert_eq!(origin.file_hits(), 1);
    assert_eq!(mirror.raw_entries("foo"), vec!["foo-3.0.tar.gz"]);
}

#[tokio::test]
async fn test_origin_not_found_is_passed_through() {
    // Test that an origin 404 reaches the client and leaves storage untouched
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;

    let (status, _, _) = mirror
        .get(&origin.packs_path("foo", "missing", "foo-9.9.tar.gz"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(mirror.raw_entries("foo").is_empty());

    // nothing was cached, so the next request goes back to the origin
    mirror
        .get(&origin.packs_path("foo", "missing", "foo-9.9.tar.gz"))
        .await;
    assert_eq!(origin.file_hits(), 2);
}

#[tokio::test]
async fn test_unreachable_origin_is_bad_gateway() {
    let mirror = Mirror::new(None, None).await;
    let path = format!("/packs/foo/http/{}/files/foo-1.0.zip", closed_addr());
    let (status, _, _) = mirror.get(&path).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(mirror.raw_entries("foo").is_empty());
}

#[tokio::test]
async fn test_malformed_download_paths_are_rejected() {
    // Test that bad schemes and paths without a file are client errors
    let mirror = Mirror::new(None, None).await;
    for path in [
        "/packs/foo/ftp/files.example/foo-1.0.zip",
        "/packs/foo/https",
        "/packs/foo/https/",
        "/packs/foo/https/files.example/dir/",
        "/packs/-foo/https/files.example/foo-1.0.zip",
    ] {
        let (status, _, _) = mirror.get(path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
    }
}

#[tokio::test]
async fn test_abandoned_download_leaves_no_partial_file() {
    // Test that a client hanging up mid-transfer discards the partial artifact
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;
    let path = origin.packs_path("foo", "slow", "foo-4.0.tar.gz");

    let response = mirror.get_streaming(&path).await;
    assert_eq!(response.status(), StatusCode::OK);
    drop(response);
    tokio::task::yield_now().await;

    assert!(mirror.raw_entries("foo").is_empty());

    let (status, _, body) = mirror.get(&path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), file_body("foo-4.0.tar.gz").as_slice());
    assert_eq!(origin.file_hits(), 2);
}

#[tokio::test]
async fn test_slow_steady_download_outlasts_read_timeout() {
    // Test that a body arriving steadily for longer than the timeout is still cached
    let origin = spawn_origin().await;
    let config = ClientConfig {
        request_timeout: Duration::from_secs(1),
        ..client_config(Some(origin.index_url()))
    };
    let mirror = Mirror::with_client(config, None).await;
    let path = origin.packs_path("foo", "trickle", "foo-5.0.tar.gz");

    let (status, _, body) = mirror.get(&path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), trickle_body().as_slice());
    assert!(mirror.store.exists("foo", "foo-5.0.tar.gz").await.unwrap());

    let (status, _, _) = mirror.get(&path).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(origin.file_hits(), 1);
}

#[tokio::test]
async fn test_truncated_origin_body_is_not_cached() {
    // Test that an origin closing before its Content-Length leaves nothing behind
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;
    let path = origin.packs_path("foo", "truncated", "foo-6.0.tar.gz");

    let response = mirror.get_streaming(&path).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
    assert!(body.is_err());

    assert!(mirror.raw_entries("foo").is_empty());
    assert!(!mirror.store.exists("foo", "foo-6.0.tar.gz").await.unwrap());

    let response = mirror.get_streaming(&path).await;
    assert_eq!(response.status(), StatusCode::OK);
    drop(response);
    assert_eq!(origin.file_hits(), 2);
}
