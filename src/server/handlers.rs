//! HTTP request handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use futures::stream;
use tokio::io::AsyncReadExt;

use crate::app::cache::{CacheOutcome, OriginDownload};
use crate::app::index::render_root;
use crate::app::store::PathGenerator;
use crate::constants::files;
use crate::errors::ProxyError;

use super::error::HandlerResult;
use super::state::AppState;

/// `GET /` - list stored projects.
pub async fn root(State(state): State<AppState>) -> HandlerResult<Html<String>> {
    let projects = state.store.list_projects().await?;
    Ok(Html(render_root(&projects, state.project_url.as_deref())))
}

/// `GET /simple/{project}/` - merged project listing.
pub async fn simple_index(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> HandlerResult<Html<String>> {
    let page = state.merger.page(&project).await?;
    Ok(Html(page))
}

/// `GET /packs/{project}/{scheme}/{*rest}` - cached origin download.
pub async fn packs(
    State(state): State<AppState>,
    Path((project, scheme, rest)): Path<(String, String, String)>,
) -> HandlerResult<Response> {
    match state.cache.fetch_or_serve(&project, &scheme, &rest).await? {
        CacheOutcome::Redirect(url) => Ok(Redirect::to(&url).into_response()),
        CacheOutcome::Stream(download) => Ok(stream_response(download)),
    }
}

/// `GET /packs/{project}/{scheme}` - download path without an origin.
pub async fn packs_incomplete(
    Path((_project, scheme)): Path<(String, String)>,
) -> HandlerResult<Response> {
    Err(ProxyError::BadRequest(format!(
        "download path for scheme {scheme:?} names no file"
    )))
}

fn stream_response(download: OriginDownload) -> Response {
    let OriginDownload {
        content_type,
        content_length,
        body,
    } = download;

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    if let Some(content_type) = content_type {
        headers.insert(CONTENT_TYPE, content_type);
    }
    if let Some(length) = content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    response
}

/// `GET /storage/{project}/{filename}` - stored artifact.
pub async fn storage(
    State(state): State<AppState>,
    Path((project, filename)): Path<(String, String)>,
) -> HandlerResult<Response> {
    let (file, size) = state.store.open_artifact(&project, &filename).await?;

    let chunks = stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; files::CHUNK_SIZE];
        let read = file.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok::<_, std::io::Error>(Some((bytes::Bytes::from(buf), file)))
    });

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (CONTENT_LENGTH, HeaderValue::from(size)),
        ],
        Body::from_stream(chunks),
    )
        .into_response())
}

/// `GET /project/{name}` - project home page.
pub async fn project_home(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> HandlerResult<Redirect> {
    PathGenerator::validate_project(&name)?;
    match state.project_url.as_deref() {
        Some(template) => Ok(Redirect::to(&template.replace("{}", &name))),
        None => Err(ProxyError::NotFound(format!(
            "no project page configured for {name}"
        ))),
    }
}
