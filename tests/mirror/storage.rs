use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use axum::http::StatusCode;

use crate::support::Mirror;

#[tokio::test]
async fn test_stored_artifact_is_served() {
    let mirror = Mirror::new(None, None).await;
    let content = vec![7u8; 20_000];
    mirror.put("foo", "foo-1.0.tar.gz", &content, Some("aaa")).await;

    let (status, headers, body) = mirror.get("/storage/foo/foo-1.0.tar.gz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/octet-stream");
    assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "20000");
    assert_eq!(body.as_ref(), content.as_slice());
}

#[tokio::test]
async fn test_storage_rejects_missing_and_reserved_names() {
    // Test that only real artifacts are reachable under /storage
    let mirror = Mirror::new(None, None).await;
    mirror.put("foo", "foo-1.0.tar.gz", b"x", Some("aaa")).await;

    let (status, _, _) = mirror.get("/storage/foo/foo-2.0.tar.gz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = mirror.get("/storage/foo/foo-1.0.tar.gz.sha256").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = mirror.get("/storage/foo/.hidden").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = mirror.get("/storage/nope/foo-1.0.tar.gz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_project_home_redirect() {
    // Test that the project page redirects through the configured template
    let mirror = Mirror::new(None, Some("https://pypi.org/project/{}/")).await;
    let (status, headers, _) = mirror.get("/project/foo").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(LOCATION).unwrap(), "https://pypi.org/project/foo/");
}

#[tokio::test]
async fn test_project_home_without_template_is_not_found() {
    let mirror = Mirror::new(None, None).await;
    let (status, _, _) = mirror.get("/project/foo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
