//! Error types for PyPack Mirror
//!
//! This module defines the error types for every component of the mirror.
//! Storage, upstream fetching and configuration each get their own enum; the
//! request-level taxonomy that HTTP handlers map onto status codes lives in
//! [`ProxyError`].

use std::path::PathBuf;

use thiserror::Error;

/// Local artifact storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying filesystem failure
    #[error("Storage I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Project name does not match the permitted pattern
    #[error("Invalid project name: {name}")]
    InvalidProject { name: String },

    /// Filename would escape the project directory or is otherwise unusable
    #[error("Invalid artifact filename: {name}")]
    InvalidFilename { name: String },

    /// Project directory already exists
    #[error("Project already exists: {name}")]
    ProjectExists { name: String },

    /// Project directory does not exist
    #[error("Project not found: {name}")]
    ProjectNotFound { name: String },

    /// Artifact does not exist
    #[error("Artifact not found: {project}/{filename}")]
    ArtifactNotFound { project: String, filename: String },

    /// Storage root is missing or not a directory
    #[error("Storage root not accessible: {path}")]
    RootNotAccessible { path: PathBuf },
}

impl StorageError {
    /// Wrap an I/O error together with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

/// Upstream HTTP fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (connect, timeout, TLS, broken stream)
    #[error("Upstream request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Upstream responded with a non-success status
    #[error("Upstream {url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    /// Invalid URL provided or reconstructed
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded for {url}")]
    MaxRetriesExceeded { url: String, max_retries: u32 },

    /// HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read or written
    #[error("Configuration file I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialised
    #[error("Configuration serialisation failed")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// User configuration directory cannot be determined
    #[error("Could not determine user config directory")]
    NoConfigDir,
}

/// Request-level error taxonomy of the mirror
///
/// Each variant corresponds to one HTTP outcome; see
/// `server::error` for the status code mapping.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// No listing or artifact can be produced
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request or reconstructed origin URL
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Upstream could not be reached
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream answered with a status that is passed through unchanged
    #[error("Upstream error: HTTP {status}")]
    UpstreamError { status: u16 },

    /// Local storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Failure inside the mirror itself
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FetchError> for ProxyError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Status { status, .. } => ProxyError::UpstreamError { status },
            FetchError::InvalidUrl { url, error } => {
                ProxyError::BadRequest(format!("invalid origin URL {url}: {error}"))
            }
            other => ProxyError::UpstreamUnavailable(other.to_string()),
        }
    }
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Request handling error
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Fetch(FetchError::Transport { .. })
                | AppError::Fetch(FetchError::MaxRetriesExceeded { .. })
                | AppError::Proxy(ProxyError::UpstreamUnavailable(_))
        )
    }

    /// Terminal report: the category and message, plus a retry hint for
    /// transient failures
    pub fn report(&self) -> String {
        let mut report = format!("Error ({}): {}", self.category(), self);
        if self.is_recoverable() {
            report.push_str("\nThe upstream may be temporarily unreachable; try again later.");
        }
        report
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Storage(_) => "storage",
            AppError::Fetch(_) => "fetch",
            AppError::Config(_) => "config",
            AppError::Proxy(_) => "request",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Storage result type alias
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Request result type alias
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;
