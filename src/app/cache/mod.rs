//! Download cache with single-flight origin fetches
//!
//! This module answers artifact download requests. Stored artifacts are
//! served by redirect; missing ones are fetched once from their origin and
//! streamed to the caller while being written to storage.
//!
//! # Key Features
//!
//! - **Reservation system**: at most one origin fetch per `(project, filename)`
//! - **Atomic operations**: temp-file + rename, so a partial body is never served
//! - **Streaming**: the caller receives bytes as the origin sends them
//!
//! # Module Organization
//!
//! - [`reservation`] - In-flight fetch table and waiters
//! - [`manager`] - Cache decisions and the tee stream
//!
//! # Examples
//!
//! ```rust,no_run
//! use pypack_mirror::app::cache::{CacheOutcome, DownloadCache};
//! use pypack_mirror::app::client::{ClientConfig, UpstreamClient};
//! use pypack_mirror::app::store::ArtifactStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ArtifactStore::open("/srv/mirror").await?;
//! let client = UpstreamClient::new(&ClientConfig::default())?;
//! let cache = DownloadCache::new(store, client);
//!
//! match cache
//!     .fetch_or_serve("foo", "https", "files.example/p/foo-1.0.tar.gz")
//!     .await?
//! {
//!     CacheOutcome::Redirect(url) => println!("already stored at {url}"),
//!     CacheOutcome::Stream(download) => println!("streaming {:?} bytes", download.content_length),
//! }
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod reservation;

// Re-export main public API
pub use manager::{ArtifactStream, CacheDecision, CacheOutcome, DownloadCache, OriginDownload};
pub use reservation::{
    Reservation, ReservationState, ReservationStatus, ReservationTable, Waiter,
};
