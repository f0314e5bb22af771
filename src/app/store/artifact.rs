//! Stored artifact description

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file in the local artifact tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Project the artifact belongs to
    pub project: String,
    /// Opaque filename, unique within the project
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Hex SHA-256 from the digest sidecar, if one exists
    pub digest: Option<String>,
}

impl Artifact {
    /// Size formatted with binary prefixes, e.g. `1.5 KiB`
    pub fn human_size(&self) -> String {
        format_binary_size(self.size)
    }
}

/// Format a byte count with binary prefixes and one decimal place
pub fn format_binary_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}
