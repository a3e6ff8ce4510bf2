//! Object key helpers.
//!
//! Buckets have no directories; a "folder" is nothing more than a shared key
//! prefix ending in [`DELIMITER`]. These functions are the single place that
//! convention is interpreted, so the tree builder, folder statistics and the
//! archive generator all agree on what a folder is.

use crate::error::{ErrorKind, Result};

/// Path segment delimiter used by convention in object keys.
pub const DELIMITER: char = '/';

/// Validates a key received from outside (e.g. a request path).
///
/// Object stores accept almost anything as a key, so this only rejects what
/// can never address an object: the empty key, and keys containing NUL.
///
/// # Examples
///
/// ```
/// use bucketview_storage::key::validate;
/// assert!(validate("reports/2024/q1.csv").is_ok());
/// assert!(validate("").is_err());
/// assert!(validate("a\0b").is_err());
/// ```
pub fn validate(key: &str) -> Result<&str> {
    if key.is_empty() || key.contains('\0') {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    Ok(key)
}

/// Normalizes a folder path into a listing prefix ending with the delimiter.
///
/// The empty path stays empty: it addresses the whole bucket rather than a
/// folder called `""`.
///
/// ```
/// use bucketview_storage::key::normalize_prefix;
/// assert_eq!(normalize_prefix("a"), "a/");
/// assert_eq!(normalize_prefix("a/b/"), "a/b/");
/// assert_eq!(normalize_prefix(""), "");
/// ```
pub fn normalize_prefix(folder: &str) -> String {
    match folder.is_empty() || folder.ends_with(DELIMITER) {
        true => folder.to_string(),
        false => format!("{folder}{DELIMITER}"),
    }
}

/// The part of `key` below `prefix`, or `None` when the key is outside the
/// prefix or *is* the prefix (a folder marker for the folder itself).
pub fn relative<'k>(key: &'k str, prefix: &str) -> Option<&'k str> {
    key.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

/// Final segment of a key, used as a download file name.
///
/// ```
/// use bucketview_storage::key::file_name;
/// assert_eq!(file_name("a/b/report.csv"), "report.csv");
/// assert_eq!(file_name("report.csv"), "report.csv");
/// ```
pub fn file_name(key: &str) -> &str {
    key.rsplit(DELIMITER).next().unwrap_or(key)
}

/// Display name of a folder: the last non-empty segment of its path.
///
/// Falls back to `"download"` for the bucket root (or a path made only of
/// delimiters), so archives always get a usable file name.
pub fn folder_name(folder: &str) -> &str {
    folder.trim_end_matches(DELIMITER).rsplit(DELIMITER).next().filter(|name| !name.is_empty()).unwrap_or("download")
}
