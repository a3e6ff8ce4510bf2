//! Process-wide registry of archive tasks.

use crate::error::{ErrorKind, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use time::UtcDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// A finished archive waiting to be downloaded.
///
/// Cloning is cheap: the archive bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedArchive {
    /// Display name of the archived folder (last path segment).
    pub folder_name: String,
    pub data: Arc<[u8]>,
    /// Number of objects packed into the archive.
    pub file_count: u64,
}
impl CompletedArchive {
    pub fn new(folder_name: impl Into<String>, data: impl Into<Arc<[u8]>>, file_count: u64) -> Self {
        Self { folder_name: folder_name.into(), data: data.into(), file_count }
    }

    /// Download file name, e.g. `photos.zip`.
    pub fn file_name(&self) -> String {
        format!("{}.zip", self.folder_name)
    }
}

struct TaskEntry {
    /// Distinguishes this entry from a later task that reuses the same id.
    serial: u64,
    cancelled: bool,
    archive: Option<CompletedArchive>,
    created_at: UtcDateTime,
}

/// Registry of in-flight and completed archive tasks, keyed by the
/// caller-supplied task id.
///
/// The task map is only reachable through these methods; every read and
/// write happens under one lock, so a cancellation and a completion racing
/// for the same task are strictly ordered and the loser sees the winner's
/// result. Entries are removed explicitly ([`remove()`](Self::remove)), by
/// a deferred eviction ([`schedule_eviction()`](Self::schedule_eviction)),
/// or when the [`Registration`] they were created through is dropped.
///
/// # Examples
///
/// ```
/// use bucketview_archive::{CompletedArchive, TaskManager};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let tasks = TaskManager::new();
/// tasks.create("t1").await.unwrap();
/// assert!(tasks.cancel("t1").await);
/// // Cancelled tasks never accept an archive.
/// let stored = tasks.complete("t1", CompletedArchive::new("photos", vec![1u8, 2, 3], 1)).await.unwrap();
/// assert!(!stored);
/// # }
/// ```
pub struct TaskManager {
    tasks: Mutex<HashMap<String, TaskEntry>>,
    serial: AtomicU64,
    shutdown: CancellationToken,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self { tasks: Mutex::new(HashMap::new()), serial: AtomicU64::new(0), shutdown: CancellationToken::new() }
    }

    /// Registers a new, empty, uncancelled task.
    pub async fn create(&self, id: &str) -> Result<()> {
        self.insert(id).await.map(|_| ())
    }

    /// Registers a task that lives only as long as the returned
    /// [`Registration`], unless it is [kept](Registration::keep).
    pub async fn register(self: &Arc<Self>, id: &str) -> Result<Registration> {
        let serial = self.insert(id).await?;
        Ok(Registration { tasks: Arc::clone(self), id: id.to_string(), serial: Some(serial) })
    }

    async fn insert(&self, id: &str) -> Result<u64> {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(id) {
            exn::bail!(ErrorKind::DuplicateTask(id.to_string()));
        }
        let serial = self.serial.fetch_add(1, Ordering::Relaxed);
        tasks.insert(id.to_string(), TaskEntry { serial, cancelled: false, archive: None, created_at: UtcDateTime::now() });
        tracing::debug!(task_id = id, "Task registered");
        Ok(serial)
    }

    /// Flags a task as cancelled. Returns whether the task exists; cancelling
    /// twice, or after completion, changes nothing else.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &str) -> bool {
        match self.tasks.lock().await.get_mut(id) {
            Some(entry) => {
                entry.cancelled = true;
                tracing::info!("Cancel requested");
                true
            },
            None => false,
        }
    }

    /// Whether a cancellation has been requested. Unknown tasks are not
    /// cancelled.
    pub async fn is_cancelled(&self, id: &str) -> bool {
        self.tasks.lock().await.get(id).is_some_and(|entry| entry.cancelled)
    }

    /// Stores the finished archive, unless the task was cancelled first.
    ///
    /// Returns `Ok(true)` when stored and `Ok(false)` when the task had been
    /// cancelled (the archive is dropped).
    pub async fn complete(&self, id: &str, archive: CompletedArchive) -> Result<bool> {
        let mut tasks = self.tasks.lock().await;
        let Some(entry) = tasks.get_mut(id) else {
            exn::bail!(ErrorKind::TaskNotFound(id.to_string()));
        };
        if entry.cancelled {
            return Ok(false);
        }
        tracing::debug!(task_id = id, bytes = archive.data.len(), "Archive stored");
        entry.archive = Some(archive);
        Ok(true)
    }

    /// The finished archive for a task.
    ///
    /// Fails with [`TaskNotFound`](ErrorKind::TaskNotFound) for unknown (or
    /// evicted) tasks and [`NotReady`](ErrorKind::NotReady) while the archive
    /// is still being generated.
    pub async fn archive(&self, id: &str) -> Result<CompletedArchive> {
        let tasks = self.tasks.lock().await;
        let entry = tasks.get(id).ok_or_else(|| exn::Exn::from(ErrorKind::TaskNotFound(id.to_string())))?;
        entry.archive.clone().ok_or_else(|| exn::Exn::from(ErrorKind::NotReady(id.to_string())))
    }

    /// Removes a task immediately. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.tasks.lock().await.remove(id).is_some()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.tasks.lock().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Removes the task `delay` from now, whatever state it is in by then.
    ///
    /// The eviction is bound to the task as it exists right now: if the id is
    /// removed and reused before the delay elapses, the new task survives.
    /// Returns `None` if there is no such task. Pending evictions are dropped
    /// by [`shutdown()`](Self::shutdown) or when the manager itself is dropped.
    pub async fn schedule_eviction(self: &Arc<Self>, id: &str, delay: Duration) -> Option<JoinHandle<()>> {
        let serial = self.tasks.lock().await.get(id)?.serial;
        let manager: Weak<Self> = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        let id = id.to_string();
        tracing::debug!(task_id = %id, delay_secs = delay.as_secs(), "Eviction scheduled");
        Some(tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {},
                _ = tokio::time::sleep(delay) => {
                    if let Some(manager) = manager.upgrade() {
                        manager.evict(&id, serial).await;
                    }
                },
            }
        }))
    }

    async fn evict(&self, id: &str, serial: u64) {
        let mut tasks = self.tasks.lock().await;
        if tasks.get(id).is_some_and(|entry| entry.serial == serial) {
            if let Some(entry) = tasks.remove(id) {
                let age = UtcDateTime::now() - entry.created_at;
                tracing::info!(task_id = id, age_secs = age.whole_seconds(), "Task cleaned up");
            }
        }
    }

    /// Stops all pending evictions. Tasks already registered stay until the
    /// process exits.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// A task owned by whoever is generating its archive.
///
/// Dropping the registration removes the task, so a progress stream that is
/// abandoned half way does not leave its task behind. Only the task instance
/// that was registered is removed; a later task reusing the id is untouched.
pub struct Registration {
    tasks: Arc<TaskManager>,
    id: String,
    serial: Option<u64>,
}
impl Registration {
    /// Hands the task over to the manager; it now lives until removed or
    /// evicted.
    pub fn keep(mut self) {
        self.serial = None;
    }

    /// Removes the task now.
    pub async fn discard(mut self) {
        if let Some(serial) = self.serial.take() {
            self.tasks.evict(&self.id, serial).await;
        }
    }
}
impl Drop for Registration {
    fn drop(&mut self) {
        let Some(serial) = self.serial.take() else {
            return;
        };
        // Removal needs the lock, which cannot be awaited here.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let tasks = Arc::clone(&self.tasks);
            let id = std::mem::take(&mut self.id);
            tracing::info!(task_id = %id, "Task abandoned before completion");
            runtime.spawn(async move { tasks.evict(&id, serial).await });
        }
    }
}
