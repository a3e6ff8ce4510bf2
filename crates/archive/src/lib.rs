//! Folder archives for bucketview.
//!
//! An archive of a folder (key prefix) is produced in one of two ways:
//!
//! - [`ArchiveGenerator::generate`] streams [`ArchiveEvent`]s while it fetches
//!   and packs each object, polls the [`TaskManager`] for cancellation between
//!   objects, and finally parks the finished archive in the task manager so a
//!   second, independent request can download it.
//! - [`ArchiveGenerator::build`] does the same work in one call and hands the
//!   archive straight back, without progress or cancellation.
//!
//! Archives are built entirely in memory.

pub mod error;
mod generate;
mod tasks;
mod writer;

pub use crate::generate::{ArchiveEvent, ArchiveGenerator};
pub use crate::tasks::{CompletedArchive, Registration, TaskManager};
pub use crate::writer::{ArchiveWriter, CompressionPolicy, Method};
