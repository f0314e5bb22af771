//! Core application logic for PyPack Mirror
//!
//! This module contains the mirror's components: version ordering, the local
//! artifact store, the upstream HTTP client, the index merger and the
//! download cache.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pypack_mirror::app::{ArtifactStore, ClientConfig, IndexMerger, UpstreamClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ArtifactStore::open("/srv/mirror").await?;
//! let client = UpstreamClient::new(&ClientConfig::default())?;
//!
//! let merger = IndexMerger::new(store, client);
//! for entry in merger.entries("requests").await? {
//!     println!("{} -> {}", entry.filename, entry.href);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod index;
pub mod store;
pub mod version;

// Re-export main public API
pub use cache::{CacheDecision, CacheOutcome, DownloadCache};
pub use client::{ClientConfig, UpstreamClient};
pub use index::{IndexEntry, IndexMerger, UpstreamListing};
pub use store::{Artifact, ArtifactStore, ArtifactWriter, DigestWriter};
pub use version::{Version, VersionKey};
