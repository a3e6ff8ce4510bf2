//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{ListPage, ObjectRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Objects are stored in a [`BTreeMap`] behind a [`RwLock`], so listings come
/// back in key order like a real bucket and all trait methods can operate on
/// `&self` without external synchronisation. Listings are split into pages of
/// [`with_page_size()`](Self::with_page_size) records, with the next key used
/// as the continuation token.
///
/// Failures can be injected per key ([`with_failing_key()`](Self::with_failing_key))
/// or for every listing call ([`set_unavailable()`](Self::set_unavailable)).
///
/// # Examples
///
/// ```
/// use bucketview_storage::backend::{MockBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("a/b.txt", b"0123456789".to_vec()),
///     ("root.txt", b"01234".to_vec()),
/// ]);
/// assert_eq!(backend.list("a/").await?.len(), 1);
/// assert_eq!(backend.read("root.txt").await?, b"01234");
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    page_size: usize,
    storage: RwLock<BTreeMap<String, Vec<u8>>>,
    failing: HashSet<String>,
    unavailable: AtomicBool,
    list_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let storage = files.into_iter().map(|(key, data)| (key.into(), data.into())).collect();
        Self {
            name: "mock".to_string(),
            page_size: 1000,
            storage: RwLock::new(storage),
            failing: HashSet::new(),
            unavailable: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
        }
    }

    /// Limit how many records a single listing page returns.
    ///
    /// Panics on zero; a backend that never makes progress is a broken test.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        assert!(page_size > 0, "MockBackend::with_page_size: page size must be positive");
        self.page_size = page_size;
        self
    }

    /// Make every read of `key` fail with a network error. The object still
    /// shows up in listings.
    pub fn with_failing_key(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    /// Toggle a full outage: while set, every listing call fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `list_page()` calls made so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `read()` calls made so far.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network(format!("{} is unavailable", self.name)));
        }
        let guard = self.storage.read().await;
        let start = continuation.unwrap_or(prefix);
        let mut matching = guard
            .range(start.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectRecord::new(key.clone(), data.len() as u64));
        let records: Vec<ObjectRecord> = matching.by_ref().take(self.page_size).collect();
        let next_token = matching.next().map(|record| record.key);
        Ok(ListPage { records, is_truncated: next_token.is_some(), next_token })
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(key) {
            exn::bail!(ErrorKind::Network(format!("injected failure reading {key}")));
        }
        self.storage.read().await.get(key).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MockBackend {
        MockBackend::with_files([
            ("a/b.txt", vec![0u8; 10]),
            ("a/c/d.txt", vec![0u8; 20]),
            ("ab.txt", vec![0u8; 1]),
            ("root.txt", vec![0u8; 5]),
        ])
    }

    #[tokio::test]
    async fn test_read() {
        let backend = sample();
        assert_eq!(backend.read("root.txt").await.unwrap().len(), 5);
        assert_eq!(backend.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let err = sample().read("missing.txt").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failing_key_is_listed_but_unreadable() {
        let backend = sample().with_failing_key("a/b.txt");
        assert_eq!(backend.list("a/").await.unwrap().len(), 2);
        let err = backend.read("a/b.txt").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_list_with_prefix_excludes_siblings() {
        let keys: Vec<_> = sample().list("a/").await.unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["a/b.txt", "a/c/d.txt"]);
    }

    #[tokio::test]
    async fn test_list_all() {
        let records = sample().list("").await.unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0], ObjectRecord::new("a/b.txt", 10));
    }

    #[tokio::test]
    async fn test_pagination_follows_tokens() {
        let backend = sample().with_page_size(1);
        let first = backend.list_page("", None).await.unwrap();
        assert_eq!(first.records.len(), 1);
        assert_eq!(first.continuation(), Some("a/c/d.txt"));

        let records = backend.list("").await.unwrap();
        assert_eq!(records.len(), 4);
        // One call for the single page above, then four pages for the full listing.
        assert_eq!(backend.list_calls(), 5);
    }

    #[tokio::test]
    async fn test_unavailable_fails_without_partial_results() {
        let backend = sample();
        backend.set_unavailable(true);
        let err = backend.list("a/").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        backend.set_unavailable(false);
        assert!(backend.list("a/").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_prefix_listing() {
        assert!(sample().list("zzz/").await.unwrap().is_empty());
    }
}
