use crate::size::format_size;
use bucketview_storage::ObjectRecord;
use bucketview_storage::key::{self, DELIMITER};
use serde::Serialize;
use std::collections::BTreeSet;

/// Statistics for one folder, as returned by the folder "info" action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    /// Folder path without the trailing delimiter.
    pub path: String,
    /// Files anywhere below the folder. Folder markers (keys ending in the
    /// delimiter) are not files and are not counted.
    pub file_count: u64,
    /// Files directly inside the folder.
    pub direct_file_count: u64,
    /// `total_size_bytes`, human readable.
    pub total_size: String,
    pub total_size_bytes: u64,
    /// Immediate subfolders, whether they contain files or only a marker.
    pub subfolder_count: u64,
}

impl FolderSummary {
    /// Summarizes the listing of `prefix`.
    ///
    /// `prefix` is normalized first, and records outside it are ignored, so a
    /// listing of the whole bucket can be passed as well.
    ///
    /// ```
    /// use bucketview_storage::ObjectRecord;
    /// use bucketview_tree::FolderSummary;
    ///
    /// let listing = [ObjectRecord::new("a/b.txt", 10), ObjectRecord::new("a/c/d.txt", 20)];
    /// let summary = FolderSummary::from_records("a", &listing);
    /// assert_eq!((summary.file_count, summary.subfolder_count, summary.total_size_bytes), (2, 1, 30));
    /// ```
    pub fn from_records<'r>(prefix: &str, records: impl IntoIterator<Item = &'r ObjectRecord>) -> Self {
        let prefix = key::normalize_prefix(prefix);
        let mut file_count: u64 = 0;
        let mut direct_file_count: u64 = 0;
        let mut total_size_bytes: u64 = 0;
        let mut subfolders = BTreeSet::new();
        for record in records {
            let Some(relative) = key::relative(&record.key, &prefix) else {
                continue;
            };
            total_size_bytes += record.size;
            if !record.is_folder_marker() {
                file_count += 1;
            }
            match relative.split_once(DELIMITER) {
                Some((subfolder, _)) => {
                    subfolders.insert(subfolder);
                },
                None => direct_file_count += 1,
            }
        }
        Self {
            path: prefix.trim_end_matches(DELIMITER).to_string(),
            file_count,
            direct_file_count,
            total_size: format_size(total_size_bytes),
            total_size_bytes,
            subfolder_count: subfolders.len() as u64,
        }
    }
}
