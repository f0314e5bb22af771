//! Merged simple-index listings
//!
//! A project page combines what is stored locally with what the upstream
//! index offers. When upstream cannot be asked, or does not know the
//! project, the page degrades to the local artifacts alone.
//!
//! # Module Organization
//!
//! - [`parse`] - Anchor extraction from upstream pages
//! - [`merge`] - Reconciliation of upstream and local entries
//! - [`render`] - HTML output

pub mod merge;
pub mod parse;
pub mod render;

use url::Url;

use crate::app::client::UpstreamClient;
use crate::app::store::ArtifactStore;
use crate::errors::ProxyResult;

pub use merge::{foreign_href, merge};
pub use render::{render_root, RenderContext};

/// What upstream said about a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamListing {
    /// No upstream index is configured
    NotConfigured,
    /// Upstream does not know the project
    NotFound,
    /// Upstream could not be reached within the retry budget
    Unavailable,
    /// Listing page and the URL it was fetched from
    Entries { html: String, base: Url },
}

/// One link of a merged listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Artifact filename shown as link text
    pub filename: String,
    /// Target, either a storage path or a download-cache path
    pub href: String,
    /// Digest fragment appended to the href
    pub fragment: Option<String>,
}

/// Produces merged project listings
#[derive(Debug, Clone)]
pub struct IndexMerger {
    store: ArtifactStore,
    client: UpstreamClient,
}

impl IndexMerger {
    pub fn new(store: ArtifactStore, client: UpstreamClient) -> Self {
        Self { store, client }
    }

    /// Build the merged entries of a project
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::NotFound` if neither side has the project,
    /// `ProxyError::UpstreamError` for a pass-through upstream status and
    /// `ProxyError::Storage` when the local tree cannot be read
    pub async fn entries(&self, project: &str) -> ProxyResult<Vec<IndexEntry>> {
        let local = self.store.list_artifacts(project).await?;
        let upstream = self.client.fetch_index(project).await?;
        tracing::debug!(
            project = %project,
            local = local.len(),
            upstream = ?upstream_kind(&upstream),
            "Merging listing"
        );
        merge(project, &local, &upstream)
    }

    /// Render the merged HTML page of a project
    ///
    /// # Errors
    ///
    /// See [`IndexMerger::entries`]
    pub async fn page(&self, project: &str) -> ProxyResult<String> {
        let entries = self.entries(project).await?;
        Ok(RenderContext::new(project).render(&entries))
    }
}

fn upstream_kind(listing: &UpstreamListing) -> &'static str {
    match listing {
        UpstreamListing::NotConfigured => "not-configured",
        UpstreamListing::NotFound => "not-found",
        UpstreamListing::Unavailable => "unavailable",
        UpstreamListing::Entries { .. } => "entries",
    }
}
