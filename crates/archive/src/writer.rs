//! In-memory zip container.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::fmt;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entries at or above this size need zip64 headers.
const LARGE_FILE_THRESHOLD: usize = u32::MAX as usize;

/// How entries are written into the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// No compression; bytes are copied as-is.
    Stored,
    Deflated,
}
impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stored => "stored",
            Self::Deflated => "deflated",
        })
    }
}
impl From<Method> for CompressionMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Stored => CompressionMethod::Stored,
            Method::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// Picks the [`Method`] for an archive from the size of its listing.
///
/// Large folders skip compression so archives are ready sooner.
///
/// ```
/// use bucketview_archive::{CompressionPolicy, Method};
///
/// let policy = CompressionPolicy::default();
/// assert_eq!(policy.method_for(100), Method::Deflated);
/// assert_eq!(policy.method_for(101), Method::Stored);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    /// Listings with more objects than this are stored uncompressed.
    pub store_threshold: usize,
}
impl Default for CompressionPolicy {
    fn default() -> Self {
        Self { store_threshold: 100 }
    }
}
impl CompressionPolicy {
    pub fn new(store_threshold: usize) -> Self {
        Self { store_threshold }
    }

    pub fn method_for(&self, object_count: usize) -> Method {
        match object_count > self.store_threshold {
            true => Method::Stored,
            false => Method::Deflated,
        }
    }
}

/// Builds a zip archive in memory, one entry at a time.
///
/// Compression runs on the blocking thread pool so large entries don't stall
/// the async runtime. If an append fails the writer is left unusable and every
/// later call fails with [`ErrorKind::Archive`].
pub struct ArchiveWriter {
    zip: Option<ZipWriter<Cursor<Vec<u8>>>>,
    method: Method,
    entries: u64,
    bytes_in: u64,
}

impl ArchiveWriter {
    pub fn new(method: Method) -> Self {
        Self { zip: Some(ZipWriter::new(Cursor::new(Vec::new()))), method, entries: 0, bytes_in: 0 }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Number of entries written so far.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Uncompressed bytes written so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Adds an entry named `name` (a `/`-separated relative path).
    pub async fn append(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        let mut zip = self.zip.take().ok_or_raise(|| ErrorKind::Archive)?;
        let method = self.method;
        let entry = name.to_string();
        let size = data.len();
        let (zip, written) = tokio::task::spawn_blocking(move || {
            let options = SimpleFileOptions::default()
                .compression_method(method.into())
                .large_file(size >= LARGE_FILE_THRESHOLD);
            let written = zip.start_file(entry, options).and_then(|()| Ok(zip.write_all(&data)?));
            (zip, written)
        })
        .await
        .or_raise(|| ErrorKind::Archive)?;
        written.or_raise(|| ErrorKind::Archive)?;
        self.zip = Some(zip);
        self.entries += 1;
        self.bytes_in += size as u64;
        tracing::trace!(entry = name, bytes = size, "Archive entry written");
        Ok(())
    }

    /// Writes the central directory and returns the finished archive.
    pub async fn finish(mut self) -> Result<Vec<u8>> {
        let zip = self.zip.take().ok_or_raise(|| ErrorKind::Archive)?;
        let cursor = tokio::task::spawn_blocking(move || zip.finish())
            .await
            .or_raise(|| ErrorKind::Archive)?
            .or_raise(|| ErrorKind::Archive)?;
        Ok(cursor.into_inner())
    }
}
