//! SHA-256 checksum utilities
//!
//! Provides the single checksum format (`sha256:<hex>`) stored in the hash
//! ledger. Readers are hashed in fixed-size chunks, so a value never depends
//! on how the bytes were split.

use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of in-memory content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of everything left in `reader`, reading
/// `chunk_size` bytes at a time.
///
/// # Errors
///
/// Returns an error if the reader fails.
pub fn compute_reader_checksum<R: Read + ?Sized>(reader: &mut R, chunk_size: usize) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}
