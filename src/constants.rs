//! Application constants for PyPack Mirror
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Program identity
pub const PROG_NAME: &str = "pypack-mirror";

/// Environment variable names for configuration overrides
pub mod env {
    /// Storage root override
    pub const STORAGE_PATH: &str = "PYPACK_MIRROR_STORAGE";

    /// Upstream index URL override
    pub const INDEX_URL: &str = "PYPACK_MIRROR_INDEX_URL";

    /// Outbound proxy URL override
    pub const PROXY_URL: &str = "PYPACK_MIRROR_PROXY_URL";

    /// Outbound proxy user override
    pub const PROXY_USER: &str = "PYPACK_MIRROR_PROXY_USER";

    /// Outbound proxy password override
    pub const PROXY_PASS: &str = "PYPACK_MIRROR_PROXY_PASS";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all outbound requests
    pub const USER_AGENT: &str = concat!("pypack-mirror/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 16;

    /// Default upstream simple index
    pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple/";
}

/// Retry configuration for the upstream index fetch
pub mod limits {
    /// Maximum retry attempts for failed index requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 250;
}

/// Server defaults
pub mod server {
    /// Default listen host
    pub const DEFAULT_HOST: &str = "127.0.0.1";

    /// Default listen port
    pub const DEFAULT_PORT: u16 = 8080;
}

/// URL path prefixes served by the mirror
pub mod paths {
    /// Simple index endpoint
    pub const SIMPLE: &str = "/simple";

    /// Download cache endpoint
    pub const PACKS: &str = "/packs";

    /// Static artifact storage
    pub const STORAGE: &str = "/storage";

    /// Project home page redirect
    pub const PROJECT: &str = "/project";
}

/// HTML selectors for upstream listing pages
pub mod selectors {
    /// Anchors carrying a download link
    pub const ANCHOR: &str = "a[href]";
}

/// File naming within the storage tree
pub mod files {
    /// Suffix of the digest sidecar record
    pub const DIGEST_SUFFIX: &str = ".sha256";

    /// Prefix of in-progress temporary files (hidden from listings)
    pub const TEMP_FILE_PREFIX: &str = ".";

    /// Suffix of in-progress temporary files
    pub const TEMP_FILE_SUFFIX: &str = ".part";

    /// Read buffer size for uploads
    pub const CHUNK_SIZE: usize = 8192;
}

/// Project naming rules
pub mod project {
    /// Permitted project directory names (case-insensitive)
    pub const NAME_PATTERN: &str = r"(?i-u)^[a-z0-9](?:[a-z0-9._-]*[a-z0-9])?$";
}
