//! Local artifact storage
//!
//! The artifact tree is the only state shared between requests. Each project
//! is a directory under the storage root holding opaque artifact files and
//! optional `.sha256` digest sidecars.
//!
//! # Module Organization
//!
//! - [`artifact`] - Stored artifact description
//! - [`digest`] - Incremental SHA-256 accumulator for sidecars
//! - [`path`] - Path generation and name validation
//! - [`writer`] - Scoped temp-file + rename writes
//!
//! # Examples
//!
//! ```rust,no_run
//! use pypack_mirror::app::store::ArtifactStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ArtifactStore::open("/srv/mirror").await?;
//!
//! let mut writer = store.open_for_write("foo", "foo-1.0.tar.gz").await?;
//! writer.write_chunk(b"archive bytes").await?;
//! writer.commit().await?;
//!
//! for artifact in store.list_artifacts("foo").await? {
//!     println!("{} ({} bytes)", artifact.filename, artifact.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod digest;
pub mod path;
pub mod writer;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info};

use crate::app::version::VersionKey;
use crate::errors::{StorageError, StorageResult};

pub use artifact::{format_binary_size, Artifact};
pub use digest::DigestWriter;
pub use path::PathGenerator;
pub use writer::ArtifactWriter;

/// Filesystem-backed artifact store
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store over `root` without touching the filesystem
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store over `root`, which must be an existing directory
    ///
    /// # Errors
    ///
    /// Returns `StorageError::RootNotAccessible` if the root is missing or
    /// not a directory
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {
                info!("Using artifact storage at {}", root.display());
                Ok(Self { root })
            }
            _ => Err(StorageError::RootNotAccessible { path: root }),
        }
    }

    /// Storage root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of an artifact on disk
    pub fn artifact_path(&self, project: &str, filename: &str) -> StorageResult<PathBuf> {
        PathGenerator::artifact_path(&self.root, project, filename)
    }

    /// Names of all project directories, sorted
    pub async fn list_projects(&self) -> StorageResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::io(&self.root, e))?;

        let mut projects = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.root, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir && PathGenerator::validate_project(&name).is_ok() {
                projects.push(name);
            }
        }
        projects.sort();
        Ok(projects)
    }

    /// All artifacts of a project, ordered by version
    ///
    /// Sidecars and in-progress temporary files are excluded. A missing
    /// project directory yields an empty list.
    pub async fn list_artifacts(&self, project: &str) -> StorageResult<Vec<Artifact>> {
        let dir = PathGenerator::project_dir(&self.root, project)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&dir, e)),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&dir, e))?
        {
            let Ok(filename) = entry.file_name().into_string() else {
                debug!("Skipping non UTF-8 entry {}", entry.path().display());
                continue;
            };
            if !PathGenerator::is_artifact_name(&filename) {
                continue;
            }
            if PathGenerator::validate_filename(&filename).is_err() {
                debug!("Skipping unservable entry {}", entry.path().display());
                continue;
            }
            let meta = entry
                .metadata()
                .await
                .map_err(|e| StorageError::io(entry.path(), e))?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            let digest = self.read_digest(project, &filename).await?;
            artifacts.push(Artifact {
                project: project.to_string(),
                filename,
                size: meta.len(),
                modified,
                digest,
            });
        }

        // Name order first so that version ties are deterministic
        artifacts.sort_by(|a, b| a.filename.cmp(&b.filename));
        let mut keyed: Vec<(VersionKey, Artifact)> = artifacts
            .into_iter()
            .map(|a| (VersionKey::from_filename(&a.filename), a))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(keyed.into_iter().map(|(_, a)| a).collect())
    }

    /// Whether a fully written artifact exists
    pub async fn exists(&self, project: &str, filename: &str) -> StorageResult<bool> {
        let path = self.artifact_path(project, filename)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Digest from the artifact's sidecar, trailing whitespace trimmed
    pub async fn read_digest(&self, project: &str, filename: &str) -> StorageResult<Option<String>> {
        let path = PathGenerator::digest_path(&self.root, project, filename)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content.trim_end().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Write the digest sidecar of an existing artifact
    pub async fn write_digest(&self, project: &str, filename: &str, digest: &str) -> StorageResult<()> {
        if !self.exists(project, filename).await? {
            return Err(StorageError::ArtifactNotFound {
                project: project.to_string(),
                filename: filename.to_string(),
            });
        }
        let path = PathGenerator::digest_path(&self.root, project, filename)?;
        fs::write(&path, digest)
            .await
            .map_err(|e| StorageError::io(&path, e))
    }

    /// Open an artifact for streamed writing
    ///
    /// Parent directories are created as needed. The caller must hold the
    /// only writer for this artifact until it is committed or dropped.
    pub async fn open_for_write(&self, project: &str, filename: &str) -> StorageResult<ArtifactWriter> {
        let final_path = self.artifact_path(project, filename)?;
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        let temp_path = PathGenerator::temp_path(&final_path);
        ArtifactWriter::create(final_path, temp_path).await
    }

    /// Incremental hash accumulator for populating sidecars
    pub fn digest_writer(&self) -> DigestWriter {
        DigestWriter::new()
    }

    /// Open a stored artifact for reading, returning the file and its size
    pub async fn open_artifact(&self, project: &str, filename: &str) -> StorageResult<(fs::File, u64)> {
        let path = self.artifact_path(project, filename)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::ArtifactNotFound {
                    project: project.to_string(),
                    filename: filename.to_string(),
                })
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        let meta = file.metadata().await.map_err(|e| StorageError::io(&path, e))?;
        if !meta.is_file() {
            return Err(StorageError::ArtifactNotFound {
                project: project.to_string(),
                filename: filename.to_string(),
            });
        }
        Ok((file, meta.len()))
    }

    /// Create an empty project directory
    pub async fn create_project(&self, project: &str) -> StorageResult<()> {
        let dir = PathGenerator::project_dir(&self.root, project)?;
        match fs::create_dir(&dir).await {
            Ok(()) => {
                info!("Created project directory {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StorageError::ProjectExists {
                name: project.to_string(),
            }),
            Err(e) => Err(StorageError::io(&dir, e)),
        }
    }

    /// Remove a project directory with everything in it
    pub async fn delete_project(&self, project: &str) -> StorageResult<()> {
        let dir = PathGenerator::project_dir(&self.root, project)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("Deleted project directory {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::ProjectNotFound {
                name: project.to_string(),
            }),
            Err(e) => Err(StorageError::io(&dir, e)),
        }
    }

    /// Remove an artifact together with its digest sidecar
    pub async fn delete_artifact(&self, project: &str, filename: &str) -> StorageResult<()> {
        let path = self.artifact_path(project, filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::ArtifactNotFound {
                    project: project.to_string(),
                    filename: filename.to_string(),
                })
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        }

        let digest_path = PathGenerator::digest_path(&self.root, project, filename)?;
        match fs::remove_file(&digest_path).await {
            Ok(()) => debug!("Removed digest sidecar {}", digest_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(&digest_path, e)),
        }

        info!("Deleted artifact {}/{}", project, filename);
        Ok(())
    }
}
