//! Storage path generation and name validation
//!
//! Every artifact lives at `{storage_root}/{project}/{filename}` with its
//! optional digest sidecar at `{storage_root}/{project}/{filename}.sha256`.
//! Project names and filenames are validated before they are joined onto the
//! storage root so that no request can address a path outside of it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

use crate::constants::{files, paths, project};
use crate::errors::{StorageError, StorageResult};

/// Characters escaped when a name is placed in a single URL path segment
pub const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn project_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(project::NAME_PATTERN).expect("project pattern is valid"))
}

/// Path generation utility for the artifact tree
pub struct PathGenerator;

impl PathGenerator {
    /// Check a project name against the permitted pattern
    pub fn validate_project(name: &str) -> StorageResult<()> {
        if project_regex().is_match(name) {
            Ok(())
        } else {
            Err(StorageError::InvalidProject {
                name: name.to_string(),
            })
        }
    }

    /// Check that a filename stays inside its project directory
    ///
    /// Names starting with a dot are reserved for in-progress writes.
    pub fn validate_filename(name: &str) -> StorageResult<()> {
        let invalid = name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\', '\0'])
            || name.ends_with(files::DIGEST_SUFFIX);
        if invalid {
            Err(StorageError::InvalidFilename {
                name: name.to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Directory holding a project's artifacts
    pub fn project_dir(root: &Path, project: &str) -> StorageResult<PathBuf> {
        Self::validate_project(project)?;
        Ok(root.join(project))
    }

    /// Location of an artifact
    pub fn artifact_path(root: &Path, project: &str, filename: &str) -> StorageResult<PathBuf> {
        Self::validate_filename(filename)?;
        Ok(Self::project_dir(root, project)?.join(filename))
    }

    /// Location of an artifact's digest sidecar
    pub fn digest_path(root: &Path, project: &str, filename: &str) -> StorageResult<PathBuf> {
        Self::validate_filename(filename)?;
        Ok(Self::project_dir(root, project)?.join(format!("{filename}{}", files::DIGEST_SUFFIX)))
    }

    /// A fresh hidden temporary path next to the final artifact location
    pub fn temp_path(final_path: &Path) -> PathBuf {
        let name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        final_path.with_file_name(format!(
            "{}{}.{}-{}{}",
            files::TEMP_FILE_PREFIX,
            name,
            std::process::id(),
            unique,
            files::TEMP_FILE_SUFFIX
        ))
    }

    /// Whether a directory entry name is an artifact (not a sidecar or temp file)
    pub fn is_artifact_name(name: &str) -> bool {
        !name.starts_with(files::TEMP_FILE_PREFIX) && !name.ends_with(files::DIGEST_SUFFIX)
    }

    /// URL under which the mirror serves a stored artifact
    pub fn storage_url(project: &str, filename: &str) -> String {
        format!(
            "{}/{}/{}",
            paths::STORAGE,
            utf8_percent_encode(project, PATH_SEGMENT),
            utf8_percent_encode(filename, PATH_SEGMENT)
        )
    }
}
