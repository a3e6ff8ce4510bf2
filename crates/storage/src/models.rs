//! Storage models.

/// A single object as reported by a bucket listing.
///
/// Records are never mutated once listed; everything downstream (tree
/// building, folder statistics, archive generation) only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRecord {
    /// Full object key, `/`-delimited by convention.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
}
impl ObjectRecord {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self { key: key.into(), size }
    }

    /// A key ending in the delimiter is a folder marker, not a file.
    pub fn is_folder_marker(&self) -> bool {
        self.key.ends_with(crate::key::DELIMITER)
    }
}

/// One page of a listing.
///
/// `next_token` is only meaningful when `is_truncated` is set; backends that
/// report a truncated page without a token are treated as exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub records: Vec<ObjectRecord>,
    pub is_truncated: bool,
    pub next_token: Option<String>,
}
impl ListPage {
    /// The continuation token for the following page, if there is one.
    pub fn continuation(&self) -> Option<&str> {
        match self.is_truncated {
            true => self.next_token.as_deref(),
            false => None,
        }
    }
}
