//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an archive failure.
///
/// ### Fatal
/// - [`ErrorKind::Storage`] - the folder listing failed; nothing was archived.
/// - [`ErrorKind::EmptyPrefix`] - the folder has no objects.
/// - [`ErrorKind::Archive`] - the zip container could not be written.
///
/// ### Non-fatal
/// - [`ErrorKind::ObjectFetch`] - one object could not be read and was left
///   out of the archive.
///
/// ### Task registry
/// - [`ErrorKind::DuplicateTask`], [`ErrorKind::TaskNotFound`],
///   [`ErrorKind::NotReady`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not list folder contents")]
    Storage,
    #[display("no files found in folder: {_0}")]
    EmptyPrefix(#[error(not(source))] String),
    #[display("could not fetch object: {_0}")]
    ObjectFetch(#[error(not(source))] String),
    #[display("could not write archive")]
    Archive,
    #[display("download task already exists: {_0}")]
    DuplicateTask(#[error(not(source))] String),
    #[display("download not found or expired: {_0}")]
    TaskNotFound(#[error(not(source))] String),
    #[display("download not ready: {_0}")]
    NotReady(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::ObjectFetch(_) | Self::NotReady(_))
    }

    /// Returns `true` for lookups of something that isn't (or isn't yet) there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EmptyPrefix(_) | Self::TaskNotFound(_) | Self::NotReady(_))
    }
}
