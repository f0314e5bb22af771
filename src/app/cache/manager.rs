//! Write-through download cache
//!
//! A request for an artifact that is already stored is answered with a
//! redirect to its storage URL. A miss starts a single origin fetch whose
//! body is written to storage and forwarded to the caller in the same pass.
//! The artifact only becomes visible once the whole body has been written.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::app::client::UpstreamClient;
use crate::app::store::{ArtifactStore, ArtifactWriter, PathGenerator};
use crate::errors::{ProxyError, ProxyResult, StorageResult};

use super::reservation::{
    Reservation, ReservationState, ReservationStatus, ReservationTable,
};

/// Whether an artifact can be served from storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// Stored; the storage URL to redirect to
    Hit(String),
    /// Not stored; the origin URL to fetch from
    Miss(Url),
}

/// Body stream handed to the HTTP layer
pub type ArtifactStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// A miss being streamed from the origin
pub struct OriginDownload {
    /// Content-Type reported by the origin
    pub content_type: Option<HeaderValue>,
    /// Content-Length reported by the origin
    pub content_length: Option<u64>,
    /// Artifact bytes, teed into storage as they are read
    pub body: ArtifactStream,
}

impl std::fmt::Debug for OriginDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginDownload")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// How to answer a download request
#[derive(Debug)]
pub enum CacheOutcome {
    /// Redirect to the stored artifact
    Redirect(String),
    /// Stream the origin response
    Stream(OriginDownload),
}

/// Download cache over an artifact store
#[derive(Debug, Clone)]
pub struct DownloadCache {
    store: ArtifactStore,
    client: UpstreamClient,
    reservations: ReservationTable,
}

impl DownloadCache {
    pub fn new(store: ArtifactStore, client: UpstreamClient) -> Self {
        Self {
            store,
            client,
            reservations: ReservationTable::new(),
        }
    }

    /// Rebuild the origin URL from a download-cache path
    ///
    /// Returns the URL and the artifact filename, its last path segment.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::BadRequest` for a scheme other than http/https,
    /// an unparsable URL or an empty terminal segment
    pub fn origin_url(scheme: &str, remainder: &str) -> ProxyResult<(Url, String)> {
        if scheme != "http" && scheme != "https" {
            return Err(ProxyError::BadRequest(format!("unsupported scheme {scheme:?}")));
        }
        let raw = format!("{scheme}://{remainder}");
        let url = Url::parse(&raw)
            .map_err(|e| ProxyError::BadRequest(format!("invalid origin URL {raw}: {e}")))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ProxyError::BadRequest(format!("origin URL {raw} has no host")));
        }

        let segment = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        let filename = percent_encoding::percent_decode_str(segment)
            .decode_utf8()
            .map_err(|e| ProxyError::BadRequest(format!("filename is not UTF-8: {e}")))?
            .into_owned();
        if filename.is_empty() {
            return Err(ProxyError::BadRequest(format!("origin URL {raw} names no file")));
        }
        Ok((url, filename))
    }

    /// Decide between serving from storage and fetching from the origin
    pub async fn decide(&self, project: &str, filename: &str, origin: &Url) -> StorageResult<CacheDecision> {
        if self.store.exists(project, filename).await? {
            Ok(CacheDecision::Hit(PathGenerator::storage_url(project, filename)))
        } else {
            Ok(CacheDecision::Miss(origin.clone()))
        }
    }

    /// Serve an artifact from storage, or fetch and cache it
    ///
    /// # Arguments
    ///
    /// * `project` - Project the artifact is filed under
    /// * `scheme` - Origin scheme, `http` or `https`
    /// * `remainder` - Origin URL after `<scheme>://`, already unescaped
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::BadRequest` for malformed input,
    /// `ProxyError::UpstreamUnavailable` when the origin cannot be reached,
    /// `ProxyError::UpstreamError` carrying a non-200 origin status and
    /// `ProxyError::Storage` for local failures
    pub async fn fetch_or_serve(
        &self,
        project: &str,
        scheme: &str,
        remainder: &str,
    ) -> ProxyResult<CacheOutcome> {
        let (origin, filename) = Self::origin_url(scheme, remainder)?;
        PathGenerator::validate_project(project)?;
        PathGenerator::validate_filename(&filename)?;

        loop {
            if let CacheDecision::Hit(url) = self.decide(project, &filename, &origin).await? {
                debug!("Cache hit for {}/{}", project, filename);
                return Ok(CacheOutcome::Redirect(url));
            }

            match self.reservations.try_reserve(project, &filename) {
                ReservationStatus::Reserved(reservation) => {
                    // A leader may have committed between the check and the reservation
                    if let CacheDecision::Hit(url) =
                        self.decide(project, &filename, &origin).await?
                    {
                        reservation.complete();
                        return Ok(CacheOutcome::Redirect(url));
                    }
                    return self
                        .start_fetch(project, &filename, origin, reservation)
                        .await
                        .map(CacheOutcome::Stream);
                }
                ReservationStatus::ReservedByOther(waiter) => match waiter.wait().await {
                    ReservationState::Failed { error } => {
                        debug!(
                            "Concurrent fetch of {}/{} failed ({}), retrying",
                            project, filename, error
                        );
                    }
                    _ => debug!("Concurrent fetch of {}/{} finished", project, filename),
                },
            }
        }
    }

    async fn start_fetch(
        &self,
        project: &str,
        filename: &str,
        origin: Url,
        reservation: Reservation,
    ) -> ProxyResult<OriginDownload> {
        info!(project = %project, filename = %filename, "Fetching {} from origin", origin);

        let response = match self.client.fetch_artifact(&origin).await {
            Ok(response) => response,
            Err(e) => {
                warn!(project = %project, filename = %filename, "Origin fetch failed: {}", e);
                reservation.fail(e.to_string());
                return Err(e.into());
            }
        };

        let writer = match self.store.open_for_write(project, filename).await {
            Ok(writer) => writer,
            Err(e) => {
                error!(project = %project, filename = %filename, "Cannot store artifact: {}", e);
                reservation.fail(e.to_string());
                return Err(e.into());
            }
        };

        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let content_length = response.content_length();
        let tee = Tee {
            upstream: response.bytes_stream().boxed(),
            writer: Some(writer),
            reservation: Some(reservation),
            expected_length: content_length,
            forwarded: 0,
            label: format!("{project}/{filename}"),
        };

        Ok(OriginDownload {
            content_type,
            content_length,
            body: tee.into_stream(),
        })
    }
}

/// Copies origin chunks into storage while forwarding them
struct Tee {
    upstream: BoxStream<'static, reqwest::Result<Bytes>>,
    writer: Option<ArtifactWriter>,
    reservation: Option<Reservation>,
    expected_length: Option<u64>,
    forwarded: u64,
    label: String,
}

impl Tee {
    fn into_stream(self) -> ArtifactStream {
        stream::unfold(Some(self), |state| async move {
            let mut tee = state?;
            match tee.upstream.next().await {
                Some(Ok(chunk)) => {
                    tee.forwarded += chunk.len() as u64;
                    tee.store_chunk(&chunk).await;
                    Some((Ok(chunk), Some(tee)))
                }
                Some(Err(e)) => {
                    warn!("Origin stream for {} broke: {}", tee.label, e);
                    tee.give_up(format!("origin stream broke: {e}")).await;
                    Some((Err(std::io::Error::other(e)), None))
                }
                None => match tee.finish().await {
                    Ok(()) => None,
                    Err(e) => Some((Err(e), None)),
                },
            }
        })
        .boxed()
    }

    /// Write a chunk; a storage failure stops caching but not forwarding
    async fn store_chunk(&mut self, chunk: &Bytes) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writer.write_chunk(chunk).await {
            error!("Caching {} failed, continuing without storing: {}", self.label, e);
            self.give_up(e.to_string()).await;
        }
    }

    async fn give_up(&mut self, error: String) {
        if let Some(writer) = self.writer.take() {
            writer.abort().await;
        }
        if let Some(reservation) = self.reservation.take() {
            reservation.fail(error);
        }
    }

    /// Commit the artifact, or report a body that did not match its length
    async fn finish(&mut self) -> std::io::Result<()> {
        if let Some(expected) = self.expected_length {
            if self.forwarded != expected {
                warn!(
                    "Origin body for {} was {} bytes, expected {}",
                    self.label, self.forwarded, expected
                );
                self.give_up("truncated origin body".to_string()).await;
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "origin body for {} was {} bytes, expected {}",
                        self.label, self.forwarded, expected
                    ),
                ));
            }
        }

        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        match writer.commit().await {
            Ok(size) => {
                info!("Cached {} ({} bytes)", self.label, size);
                if let Some(reservation) = self.reservation.take() {
                    reservation.complete();
                }
            }
            Err(e) => {
                error!("Committing {} failed: {}", self.label, e);
                self.give_up(e.to_string()).await;
            }
        }
        Ok(())
    }
}
