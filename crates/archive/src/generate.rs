use crate::error::{ErrorKind, Result};
use crate::tasks::{CompletedArchive, TaskManager};
use crate::writer::{ArchiveWriter, CompressionPolicy};
use async_stream::stream;
use bucketview_storage::key;
use bucketview_storage::{BackendHandle, ObjectRecord};
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Default lifetime of a finished archive that is never downloaded.
const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

/// Progress events emitted by [`ArchiveGenerator::generate`].
///
/// A run emits zero or more [`Progress`](Self::Progress) and
/// [`Skipped`](Self::Skipped) events, then exactly one terminal event:
/// [`Complete`](Self::Complete), [`Cancelled`](Self::Cancelled), or an `Err`
/// item. `current` is strictly increasing and never exceeds `total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    /// Another object has been packed. `total` is the size of the listing,
    /// folder markers included.
    Progress { current: u64, total: u64 },
    /// An object could not be fetched and was left out.
    Skipped { key: String },
    /// The archive is stored in the task manager and ready for download.
    Complete { file_count: u64 },
    /// The run noticed a cancellation request and stored nothing.
    Cancelled,
}
impl ArchiveEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Cancelled)
    }
}

/// What [`ArchiveGenerator::assemble`] reports back to its two callers.
enum Stage {
    Progress { current: u64, total: u64 },
    Skipped(String),
    Cancelled,
    Finished(CompletedArchive),
}

/// Packs every object under a folder into a zip archive.
pub struct ArchiveGenerator {
    backend: BackendHandle,
    tasks: Arc<TaskManager>,
    policy: CompressionPolicy,
    retention: Duration,
}

impl ArchiveGenerator {
    pub fn new(backend: BackendHandle, tasks: Arc<TaskManager>) -> Self {
        Self { backend, tasks, policy: CompressionPolicy::default(), retention: DEFAULT_RETENTION }
    }

    pub fn with_policy(mut self, policy: CompressionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// How long a finished archive is kept, downloaded or not.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn tasks(&self) -> &Arc<TaskManager> {
        &self.tasks
    }

    /// Archives `folder` under `task_id`, reporting progress as it goes.
    ///
    /// The stream is lazy: nothing is listed until it is first polled. The
    /// task is registered once the listing turns out non-empty; a failed or
    /// empty listing yields a single `Err` and registers nothing. Between
    /// objects the task's cancellation flag is checked, so at most one more
    /// object is fetched after [`TaskManager::cancel`]. On success the archive
    /// is left in the task manager for [`TaskManager::archive`] and evicted
    /// once the retention period has passed since completion. On
    /// cancellation or failure, or when the stream is dropped before it ends,
    /// the task is removed.
    pub fn generate<'a>(
        &'a self,
        folder: &'a str,
        task_id: &'a str,
    ) -> impl Stream<Item = Result<ArchiveEvent>> + Send + 'a {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            let prefix = key::normalize_prefix(folder);
            let records = match self.listing(&prefix).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!(task_id, prefix = %prefix, error = ?e, "Archive generation aborted");
                    yield Err(e);
                    return;
                },
            };
            let registration = match self.tasks.register(task_id).await {
                Ok(registration) => registration,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            tracing::info!(task_id, prefix = %prefix, objects = records.len(), "Archive generation started");

            let mut stages = pin!(self.assemble(&prefix, &records, Some(task_id)));
            while let Some(stage) = stages.next().await {
                match stage {
                    Ok(Stage::Progress { current, total }) => yield Ok(ArchiveEvent::Progress { current, total }),
                    Ok(Stage::Skipped(key)) => yield Ok(ArchiveEvent::Skipped { key }),
                    Ok(Stage::Cancelled) => {
                        registration.discard().await;
                        tracing::info!(task_id, "Archive generation cancelled");
                        yield Ok(ArchiveEvent::Cancelled);
                        return;
                    },
                    Ok(Stage::Finished(archive)) => {
                        let file_count = archive.file_count;
                        match self.tasks.complete(task_id, archive).await {
                            Ok(true) => {
                                registration.keep();
                                // Retention counts from completion.
                                self.tasks.schedule_eviction(task_id, self.retention).await;
                                tracing::info!(task_id, file_count, "Archive ready");
                                yield Ok(ArchiveEvent::Complete { file_count });
                            },
                            Ok(false) => {
                                registration.discard().await;
                                tracing::info!(task_id, "Archive generation cancelled");
                                yield Ok(ArchiveEvent::Cancelled);
                            },
                            Err(e) => {
                                registration.discard().await;
                                yield Err(e);
                            },
                        }
                        return;
                    },
                    Err(e) => {
                        registration.discard().await;
                        tracing::error!(task_id, error = ?e, "Archive generation aborted");
                        yield Err(e);
                        return;
                    },
                }
            }
        })
    }

    /// Archives `folder` in one go and returns the archive directly, without
    /// registering a task.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn build(&self, folder: &str) -> Result<CompletedArchive> {
        let prefix = key::normalize_prefix(folder);
        let records = self.listing(&prefix).await?;
        let mut stages = pin!(self.assemble(&prefix, &records, None));
        while let Some(stage) = stages.next().await {
            if let Stage::Finished(archive) = stage? {
                return Ok(archive);
            }
        }
        // Without a task id nothing can cancel the run.
        exn::bail!(ErrorKind::Archive)
    }

    async fn listing(&self, prefix: &str) -> Result<Vec<ObjectRecord>> {
        let records = self.backend.list(prefix).await.or_raise(|| ErrorKind::Storage)?;
        if records.is_empty() {
            exn::bail!(ErrorKind::EmptyPrefix(prefix.to_string()));
        }
        Ok(records)
    }

    async fn is_cancelled(&self, task_id: Option<&str>) -> bool {
        match task_id {
            Some(id) => self.tasks.is_cancelled(id).await,
            None => false,
        }
    }

    /// Fetches and packs `records` below `prefix`, shared by both entry points.
    ///
    /// Records outside the prefix, and the folder's own marker, are passed
    /// over without being fetched. Objects that fail to download are reported
    /// as skipped.
    fn assemble<'a>(
        &'a self,
        prefix: &'a str,
        records: &'a [ObjectRecord],
        task_id: Option<&'a str>,
    ) -> impl Stream<Item = Result<Stage>> + Send + 'a {
        stream!({
            let total = records.len() as u64;
            let mut writer = ArchiveWriter::new(self.policy.method_for(records.len()));
            let mut current: u64 = 0;
            for record in records {
                if self.is_cancelled(task_id).await {
                    yield Ok(Stage::Cancelled);
                    return;
                }
                let Some(name) = key::relative(&record.key, prefix) else {
                    continue;
                };
                let data = match self.backend.read(&record.key).await.or_raise(|| ErrorKind::ObjectFetch(record.key.clone())) {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!(key = %record.key, error = ?e, "Skipping object that could not be fetched");
                        yield Ok(Stage::Skipped(record.key.clone()));
                        continue;
                    },
                };
                if let Err(e) = writer.append(name, data).await {
                    yield Err(e);
                    return;
                }
                current += 1;
                tracing::debug!(key = %record.key, current, total, "Object archived");
                yield Ok(Stage::Progress { current, total });
            }
            // A cancellation after the last object still wins over completion.
            if self.is_cancelled(task_id).await {
                yield Ok(Stage::Cancelled);
                return;
            }

            let method = writer.method();
            let files = writer.entries();
            let bytes_in = writer.bytes_in();
            let data = match writer.finish().await {
                Ok(data) => data,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let ratio = match bytes_in {
                0 => 1.0,
                n => data.len() as f64 / n as f64,
            };
            tracing::info!(
                prefix,
                %method,
                files,
                uncompressed = bytes_in,
                archive_size = data.len(),
                ratio = format!("{ratio:.3}"),
                "Archive finalized"
            );
            yield Ok(Stage::Finished(CompletedArchive::new(key::folder_name(prefix), data, files)));
        })
    }
}
