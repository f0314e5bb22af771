//! Scoped artifact writes with visible-when-complete semantics
//!
//! Bytes are written to a hidden temporary file next to the final location.
//! Only [`ArtifactWriter::commit`] renames it into place, so a reader can
//! never observe a partially written artifact. A writer dropped without
//! committing removes its temporary file.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::errors::{StorageError, StorageResult};

/// Exclusive handle for writing one artifact
#[derive(Debug)]
pub struct ArtifactWriter {
    file: Option<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
    finished: bool,
}

impl ArtifactWriter {
    /// Create the temporary file for `final_path`
    pub(crate) async fn create(final_path: PathBuf, temp_path: PathBuf) -> StorageResult<Self> {
        let file = File::create(&temp_path)
            .await
            .map_err(|e| StorageError::io(&temp_path, e))?;
        debug!("Opened temporary artifact file: {}", temp_path.display());
        Ok(Self {
            file: Some(file),
            temp_path,
            final_path,
            bytes_written: 0,
            finished: false,
        })
    }

    /// Append a chunk
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StorageError::Io {
                path: self.temp_path.clone(),
                message: "writer already closed".to_string(),
            })?;
        file.write_all(chunk)
            .await
            .map_err(|e| StorageError::io(&self.temp_path, e))?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Final location of the artifact
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flush to disk and atomically move the artifact into place
    ///
    /// Returns the number of bytes in the committed artifact.
    pub async fn commit(mut self) -> StorageResult<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| StorageError::io(&self.temp_path, e))?;
            file.sync_all()
                .await
                .map_err(|e| StorageError::io(&self.temp_path, e))?;
        }

        tokio::fs::rename(&self.temp_path, &self.final_path)
            .await
            .map_err(|e| StorageError::io(&self.final_path, e))?;
        self.finished = true;

        debug!(
            "Committed artifact {} ({} bytes)",
            self.final_path.display(),
            self.bytes_written
        );
        Ok(self.bytes_written)
    }

    /// Discard everything written so far
    pub async fn abort(mut self) {
        self.file.take();
        if let Err(e) = tokio::fs::remove_file(&self.temp_path).await {
            warn!(
                "Failed to remove temporary file {}: {}",
                self.temp_path.display(),
                e
            );
        }
        self.finished = true;
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if !self.finished {
            self.file.take();
            // Drop may run outside a runtime
            if std::fs::remove_file(&self.temp_path).is_ok() {
                debug!(
                    "Removed abandoned temporary file: {}",
                    self.temp_path.display()
                );
            }
        }
    }
}
