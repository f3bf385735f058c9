//! Buffering of fetched content
//!
//! A download is copied into a [`SpooledTempFile`] before anything else
//! happens to it, so the bytes can be hashed and then parsed from the same
//! buffer without going back to the remote.

use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::SpooledTempFile;
use tracing::debug;

use crate::checksum::compute_reader_checksum;
use crate::{Error, Result};

/// Bytes kept in memory before the spool moves to disk
pub const SPOOL_THRESHOLD: usize = 16 * 1024 * 1024;

/// A fully buffered download
#[derive(Debug)]
pub struct Spooled {
    file: SpooledTempFile,
    len: u64,
}

impl Spooled {
    /// Number of bytes buffered
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once the buffer no longer fits in memory
    pub fn is_on_disk(&self) -> bool {
        self.file.is_rolled()
    }

    /// Hash the whole buffer and rewind it for the next reader.
    pub fn checksum(&mut self, chunk_size: usize) -> Result<String> {
        self.rewind()?;
        let checksum = compute_reader_checksum(&mut self.file, chunk_size)?;
        self.rewind()?;
        Ok(checksum)
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(drop)
    }

    /// The buffer as a seekable reader, positioned at the start.
    pub fn reader(&mut self) -> io::Result<&mut SpooledTempFile> {
        self.rewind()?;
        Ok(&mut self.file)
    }
}

/// Copy `source` into a spooled buffer, `chunk_size` bytes at a time.
///
/// When `expected_len` is known, a shorter body is reported as
/// [`Error::Truncated`].
pub fn spool<R: Read + ?Sized>(
    source: &mut R,
    chunk_size: usize,
    expected_len: Option<u64>,
) -> Result<Spooled> {
    let mut file = SpooledTempFile::new(SPOOL_THRESHOLD);
    let len = copy_chunked(source, &mut file, chunk_size)?;
    file.flush()?;

    match expected_len {
        Some(expected) if len < expected => {
            return Err(Error::Truncated {
                expected,
                received: len,
            });
        }
        _ => {}
    }

    debug!(bytes = len, rolled = file.is_rolled(), "Spooled download");
    let mut spooled = Spooled { file, len };
    spooled.rewind()?;
    Ok(spooled)
}

/// Copy everything from `reader` into `writer` in `chunk_size` pieces.
/// Returns the number of bytes copied.
pub fn copy_chunked<R, W>(reader: &mut R, writer: &mut W, chunk_size: usize) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }

    Ok(total)
}
