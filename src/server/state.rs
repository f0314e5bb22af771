//! Application state shared across handlers.

use std::sync::Arc;

use crate::app::cache::DownloadCache;
use crate::app::client::UpstreamClient;
use crate::app::index::IndexMerger;
use crate::app::store::ArtifactStore;

/// Shared state; every field is cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: ArtifactStore,
    pub merger: IndexMerger,
    pub cache: DownloadCache,
    /// Project home page template containing `{}`
    pub project_url: Option<Arc<str>>,
}

impl AppState {
    /// Create application state over one store and one upstream client.
    pub fn new(store: ArtifactStore, client: UpstreamClient, project_url: Option<String>) -> Self {
        Self {
            merger: IndexMerger::new(store.clone(), client.clone()),
            cache: DownloadCache::new(store.clone(), client),
            store,
            project_url: project_url.map(Arc::from),
        }
    }
}
