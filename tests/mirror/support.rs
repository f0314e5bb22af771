//! Shared fixtures: a local origin server and a mirror router over a temp dir

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, StreamExt};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use pypack_mirror::app::client::{ClientConfig, UpstreamClient};
use pypack_mirror::app::store::ArtifactStore;
use pypack_mirror::server::{create_router, AppState};

/// Listing served by the origin for project `foo`
pub const FOO_LISTING: &str = r#"<!DOCTYPE html>
<html><body><h1>Links for foo</h1>
<a href="../../files/foo-1.0.tar.gz#sha256=bbb">foo-1.0.tar.gz</a><br/>
<a href="../../files/foo-2.0.tar.gz#sha256=ccc">foo-2.0.tar.gz</a><br/>
</body></html>
"#;

/// Body the origin serves for a file name
pub fn file_body(name: &str) -> Vec<u8> {
    format!("contents of {name}\n").repeat(64).into_bytes()
}

#[derive(Clone, Default)]
struct Counters {
    files: Arc<AtomicUsize>,
    index: Arc<AtomicUsize>,
}

/// A running origin server standing in for both the index and file hosts
pub struct Origin {
    pub addr: SocketAddr,
    counters: Counters,
}

impl Origin {
    /// Base URL of the simple index
    pub fn index_url(&self) -> Url {
        Url::parse(&format!("http://{}/simple/", self.addr)).unwrap()
    }

    /// Number of file downloads served
    pub fn file_hits(&self) -> usize {
        self.counters.files.load(Ordering::SeqCst)
    }

    /// Number of index pages requested
    pub fn index_hits(&self) -> usize {
        self.counters.index.load(Ordering::SeqCst)
    }

    /// Mirror path for a file on this origin
    pub fn packs_path(&self, project: &str, route: &str, name: &str) -> String {
        format!("/packs/{project}/http/{}/{route}/{name}", self.addr)
    }
}

async fn index_page(State(counters): State<Counters>, Path(project): Path<String>) -> Response {
    counters.index.fetch_add(1, Ordering::SeqCst);
    match project.as_str() {
        "foo" => ([(CONTENT_TYPE, "text/html")], FOO_LISTING).into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "forbidden" => StatusCode::FORBIDDEN.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn file(State(counters): State<Counters>, Path(name): Path<String>) -> Response {
    counters.files.fetch_add(1, Ordering::SeqCst);
    let body = file_body(&name);
    (
        [
            (CONTENT_TYPE, "application/x-tar".to_string()),
            (CONTENT_LENGTH, body.len().to_string()),
        ],
        body,
    )
        .into_response()
}

/// Same bytes as `file`, trickled out in small delayed chunks
async fn slow_file(State(counters): State<Counters>, Path(name): Path<String>) -> Response {
    counters.files.fetch_add(1, Ordering::SeqCst);
    let body = file_body(&name);
    let length = body.len();
    let chunks: Vec<Bytes> = body.chunks(256).map(Bytes::copy_from_slice).collect();
    let stream = stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, Infallible>(chunk)
    });
    (
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_LENGTH, length.to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Body of `/trickle/`: ten 100-byte chunks
pub fn trickle_body() -> Vec<u8> {
    (0..10u8).flat_map(|i| vec![b'a' + i; 100]).collect()
}

/// Sends `trickle_body` one chunk every 200ms, two seconds in total
async fn trickle_file(State(counters): State<Counters>) -> Response {
    counters.files.fetch_add(1, Ordering::SeqCst);
    let body = trickle_body();
    let chunks: Vec<Bytes> = body.chunks(100).map(Bytes::copy_from_slice).collect();
    let stream = stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok::<_, Infallible>(chunk)
    });
    (
        [(CONTENT_LENGTH, body.len().to_string())],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Declares 1000 bytes, sends 300, then drops the connection
async fn truncated_file(State(counters): State<Counters>) -> Response {
    counters.files.fetch_add(1, Ordering::SeqCst);
    let items = vec![
        Ok(Bytes::from(vec![b'x'; 300])),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "origin went away",
        )),
    ];
    (
        [(CONTENT_LENGTH, "1000".to_string())],
        Body::from_stream(stream::iter(items).then(|item| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            item
        })),
    )
        .into_response()
}

async fn missing_file(State(counters): State<Counters>) -> StatusCode {
    counters.files.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

/// Start an origin server on an ephemeral port
pub async fn spawn_origin() -> Origin {
    let counters = Counters::default();
    let app = Router::new()
        .route("/simple/{project}/", get(index_page))
        .route("/files/{name}", get(file))
        .route("/slow/{name}", get(slow_file))
        .route("/missing/{name}", get(missing_file))
        .route("/trickle/{name}", get(trickle_file))
        .route("/truncated/{name}", get(truncated_file))
        .with_state(counters.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Origin { addr, counters }
}

/// An address nothing listens on
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Client settings with fast retries
pub fn client_config(index_url: Option<Url>) -> ClientConfig {
    ClientConfig {
        index_url,
        max_retries: 1,
        retry_base_delay: Duration::from_millis(1),
        request_timeout: Duration::from_secs(10),
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// Mirror router over a temporary storage root
pub struct Mirror {
    pub router: Router,
    pub store: ArtifactStore,
    pub storage: TempDir,
}

impl Mirror {
    pub async fn new(index_url: Option<Url>, project_url: Option<&str>) -> Self {
        Self::with_client(client_config(index_url), project_url).await
    }

    pub async fn with_client(config: ClientConfig, project_url: Option<&str>) -> Self {
        let storage = TempDir::new().unwrap();
        let store = ArtifactStore::open(storage.path()).await.unwrap();
        let client = UpstreamClient::new(&config).unwrap();
        let state = AppState::new(store.clone(), client, project_url.map(str::to_string));
        Self {
            router: create_router(state),
            store,
            storage,
        }
    }

    /// Store an artifact, optionally with a digest sidecar
    pub async fn put(&self, project: &str, filename: &str, content: &[u8], digest: Option<&str>) {
        let mut writer = self.store.open_for_write(project, filename).await.unwrap();
        writer.write_chunk(content).await.unwrap();
        writer.commit().await.unwrap();
        if let Some(digest) = digest {
            self.store.write_digest(project, filename, digest).await.unwrap();
        }
    }

    /// Issue a GET and collect the whole response
    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
        get_with(self.router.clone(), uri).await
    }

    /// Issue a GET and return the response with its body unread
    pub async fn get_streaming(&self, uri: &str) -> Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Names in a project directory, including hidden ones
    pub fn raw_entries(&self, project: &str) -> Vec<String> {
        match std::fs::read_dir(self.storage.path().join(project)) {
            Ok(entries) => {
                let mut names: Vec<String> = entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                names
            }
            Err(_) => Vec::new(),
        }
    }
}

/// Issue a GET against a router and collect the whole response
pub async fn get_with(router: Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

/// Hrefs of every link on a listing page, in order
pub fn hrefs(page: &[u8]) -> Vec<String> {
    const OPEN: &str = "<a href=\"";
    let mut rest = std::str::from_utf8(page).unwrap();
    let mut found = Vec::new();
    while let Some(start) = rest.find(OPEN) {
        rest = &rest[start + OPEN.len()..];
        let end = rest.find('"').unwrap();
        found.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    found
}
