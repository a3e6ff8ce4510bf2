//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the boundary between
//! bucketview and whatever object store holds the data (an S3-compatible
//! service in production, an in-memory map in tests).

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::{ListPage, ObjectRecord};
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub type ObjectRecordStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectRecord>> + Send + 'a>>;

/// Unified interface for object storage backends.
///
/// Implementations only need to provide single-page listing and whole-object
/// reads. Exhaustive listing across continuation tokens is provided on top of
/// [`list_page()`](Self::list_page) so every backend paginates the same way.
///
/// # Examples
///
/// ```
/// use bucketview_storage::{StorageBackend, error::Result};
///
/// async fn folder_size(backend: &dyn StorageBackend, prefix: &str) -> Result<u64> {
///     let records = backend.list(prefix).await?;
///     Ok(records.iter().map(|r| r.size).sum())
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Fetch a single page of object records whose keys start with `prefix`.
    ///
    /// Pass the previous page's [`continuation()`](ListPage::continuation)
    /// token to fetch the next one. Records within and across pages are in
    /// lexicographic key order.
    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage>;

    /// Stream every object record under `prefix`, following continuation
    /// tokens until the backend reports no more pages.
    ///
    /// A failing page call is yielded as the final item; records from earlier
    /// pages have already been yielded by then, so callers that must not act
    /// on partial results should use [`list()`](Self::list).
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use bucketview_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream("reports/");
    /// while let Some(record) = stream.try_next().await? {
    ///     println!("{}: {} bytes", record.key, record.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: &'a str) -> ObjectRecordStream<'a> {
        Box::pin(stream! {
            let mut continuation: Option<String> = None;
            let mut pages: u64 = 0;
            loop {
                let page = match self.list_page(prefix, continuation.as_deref()).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                pages += 1;
                tracing::debug!(backend = self.name(), prefix, page = pages, records = page.records.len(), "Listing page fetched");
                let next = page.continuation().map(str::to_string);
                for record in page.records {
                    yield Ok(record);
                }
                match next {
                    Some(token) => continuation = Some(token),
                    None => break,
                }
            }
        })
    }

    /// Every object record under `prefix`, fully materialized.
    ///
    /// Fails without partial results if any page call fails.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectRecord>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Read an object's complete contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;
}
