//! Incremental SHA-256 digests for artifact sidecars

use sha2::{Digest, Sha256};

/// Incremental hash accumulator
///
/// Fed chunk by chunk while the same bytes are written elsewhere, so an
/// upload is hashed without a second pass over the file.
#[derive(Debug, Clone, Default)]
pub struct DigestWriter {
    hasher: Sha256,
    bytes: u64,
}

impl DigestWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk to the digest
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes hashed so far
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Finish and return the lowercase hex digest
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
