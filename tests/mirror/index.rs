use axum::http::header::SERVER;
use axum::http::StatusCode;
use url::Url;

use crate::support::{closed_addr, hrefs, spawn_origin, Mirror};

#[tokio::test]
async fn test_listing_merges_local_and_upstream() {
    // Test that a locally stored file replaces its upstream twin and keeps the local digest
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;
    mirror.put("foo", "foo-1.0.tar.gz", b"local", Some("aaa")).await;

    let (status, _, body) = mirror.get("/simple/foo/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        hrefs(&body),
        vec![
            "/storage/foo/foo-1.0.tar.gz#aaa".to_string(),
            format!("{}#sha256=ccc", origin.packs_path("foo", "files", "foo-2.0.tar.gz")),
        ]
    );

    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("Links for foo"));
    assert!(page.contains(">foo-1.0.tar.gz</a>"));
    assert!(page.contains(">foo-2.0.tar.gz</a>"));
    assert_eq!(origin.index_hits(), 1);
}

#[tokio::test]
async fn test_listing_without_trailing_slash() {
    // Test that both project listing paths serve the same page
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;

    let (with_slash, _, a) = mirror.get("/simple/foo/").await;
    let (without_slash, _, b) = mirror.get("/simple/foo").await;
    assert_eq!(with_slash, StatusCode::OK);
    assert_eq!(without_slash, StatusCode::OK);
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_upstream_not_found_falls_back_to_local() {
    // Test that an upstream 404 still lists what is stored locally
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;
    mirror.put("bar", "bar-0.1.zip", b"zip", None).await;

    let (status, _, body) = mirror.get("/simple/bar/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hrefs(&body), vec!["/storage/bar/bar-0.1.zip"]);

    let (status, _, _) = mirror.get("/simple/nothing/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unreachable_index_serves_local_listing() {
    // Test that a dead index degrades to the local files instead of failing
    let dead = Url::parse(&format!("http://{}/simple/", closed_addr())).unwrap();
    let mirror = Mirror::new(Some(dead), None).await;
    mirror.put("foo", "foo-1.0.tar.gz", b"local", None).await;

    let (status, _, body) = mirror.get("/simple/foo/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hrefs(&body), vec!["/storage/foo/foo-1.0.tar.gz"]);

    let (status, _, _) = mirror.get("/simple/other/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_index_server_errors_are_retried_then_degraded() {
    // Test that a failing index is retried before falling back to local files
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;
    mirror.put("broken", "broken-1.0.zip", b"zip", None).await;

    let (status, _, body) = mirror.get("/simple/broken/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hrefs(&body), vec!["/storage/broken/broken-1.0.zip"]);
    assert_eq!(origin.index_hits(), 2);
}

#[tokio::test]
async fn test_other_upstream_statuses_pass_through() {
    // Test that an unexpected index status is reported to the client
    let origin = spawn_origin().await;
    let mirror = Mirror::new(Some(origin.index_url()), None).await;

    let (status, _, _) = mirror.get("/simple/forbidden/").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_local_only_mode_never_contacts_upstream() {
    // Test that a disabled index lists local files and nothing else
    let origin = spawn_origin().await;
    let mirror = Mirror::new(None, None).await;
    mirror.put("foo", "foo-1.0.tar.gz", b"local", Some("aaa")).await;

    let (status, _, body) = mirror.get("/simple/foo/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hrefs(&body), vec!["/storage/foo/foo-1.0.tar.gz#aaa"]);
    assert_eq!(origin.index_hits(), 0);

    let (status, _, _) = mirror.get("/simple/bar/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_project_name_is_rejected() {
    let mirror = Mirror::new(None, None).await;
    let (status, _, _) = mirror.get("/simple/-foo/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_root_lists_projects() {
    // Test that the root page links every stored project in order
    let mirror = Mirror::new(None, Some("https://example.org/{}")).await;
    mirror.put("zeta", "zeta-1.0.zip", b"z", None).await;
    mirror.put("alpha", "alpha-1.0.zip", b"a", None).await;

    let (status, headers, body) = mirror.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(SERVER).is_some());
    assert_eq!(
        hrefs(&body),
        vec!["/simple/alpha/", "/project/alpha", "/simple/zeta/", "/project/zeta"]
    );
}

#[tokio::test]
async fn test_server_header_is_set() {
    let mirror = Mirror::new(None, None).await;
    let (_, headers, _) = mirror.get("/simple/missing/").await;
    let server = headers.get(SERVER).unwrap().to_str().unwrap();
    assert!(server.starts_with("pypack-mirror/"));
}
