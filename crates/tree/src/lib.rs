//! Virtual folder hierarchy over a flat bucket listing.
//!
//! A bucket listing is a flat sequence of keys; this crate turns it into the
//! nested view users browse ([`TreeNode`]), the per-folder statistics shown by
//! the "info" action ([`FolderSummary`]), and the display ordering the page
//! renderer walks ([`TreeNode::rows`]).

mod size;
mod summary;
mod tree;

pub use crate::size::format_size;
pub use crate::summary::FolderSummary;
pub use crate::tree::{FileEntry, Row, TreeNode};
