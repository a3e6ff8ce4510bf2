use crate::render::Renderer;
use crate::response::{ApiError, Attachment, CancelReply, ProgressMessage};
use bucketview_archive::ArchiveGenerator;
use bucketview_config::Config;
use bucketview_storage::BackendHandle;
use bucketview_storage::key;
use bucketview_tree::{FolderSummary, TreeNode};
use futures::StreamExt;
use rocket::http::uri::{Segments, fmt::Path};
use rocket::http::{ContentType, Status};
use rocket::response::content::RawHtml;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::{Route, State, get, post, routes};
use std::pin::pin;

/// Used when a progress request names no task.
const UNNAMED_TASK: &str = "unknown";

pub fn routes() -> Vec<Route> {
    routes![index, download, folder_info, download_folder_progress, get_zip, cancel_download, download_folder]
}

/// Rejoins a trailing path parameter into a key or folder path. Segments
/// arrive percent-decoded.
fn joined(segments: Segments<'_, Path>) -> String {
    segments.collect::<Vec<_>>().join("/")
}

#[get("/")]
async fn index(
    config: &State<Config>,
    backend: &State<BackendHandle>,
    renderer: &State<Renderer>,
) -> Result<RawHtml<String>, ApiError> {
    let records = backend.list("").await?;
    tracing::info!(objects = records.len(), "Listing bucket");
    let tree = TreeNode::build(&records);
    Ok(RawHtml(renderer.index(&config.title, &config.storage.bucket, &tree)?))
}

#[get("/download/<key..>")]
async fn download(key: Segments<'_, Path>, backend: &State<BackendHandle>) -> Result<Attachment, ApiError> {
    let key = joined(key);
    let data = backend.read(key::validate(&key)?).await?;
    tracing::info!(key = %key, bytes = data.len(), "Object downloaded");
    Ok(Attachment::new(key::file_name(&key), ContentType::Binary, data))
}

#[get("/folder-info/<prefix..>")]
async fn folder_info(prefix: Segments<'_, Path>, backend: &State<BackendHandle>) -> Result<Json<FolderSummary>, ApiError> {
    let folder = joined(prefix);
    let records = backend.list(&key::normalize_prefix(&folder)).await?;
    let summary = FolderSummary::from_records(&folder, &records);
    tracing::info!(folder = %folder, files = summary.file_count, bytes = summary.total_size_bytes, "Folder summarized");
    Ok(Json(summary))
}

/// Streams archive progress as server-sent events; the last event is always
/// `complete`, `cancelled` or `error`.
#[get("/download-folder-progress/<prefix..>?<task_id>")]
fn download_folder_progress<'r>(
    prefix: Segments<'r, Path>,
    task_id: Option<&'r str>,
    generator: &'r State<ArchiveGenerator>,
) -> EventStream![Event + 'r] {
    let folder = joined(prefix);
    let task_id = task_id.unwrap_or(UNNAMED_TASK);
    EventStream! {
        let mut events = pin!(generator.generate(&folder, task_id));
        while let Some(event) = events.next().await {
            let message = ProgressMessage::from(event);
            let terminal = message.is_terminal();
            yield Event::json(&message);
            if terminal {
                break;
            }
        }
    }
}

/// Hands out a finished archive. It stays available for the configured
/// eviction delay so interrupted downloads can be retried.
#[get("/get-zip/<task_id>")]
async fn get_zip(
    task_id: &str,
    generator: &State<ArchiveGenerator>,
    config: &State<Config>,
) -> Result<Attachment, ApiError> {
    let tasks = generator.tasks();
    let archive = tasks.archive(task_id).await?;
    tasks.schedule_eviction(task_id, config.archive.eviction_delay()).await;
    tracing::info!(task_id, bytes = archive.data.len(), "Archive downloaded");
    Ok(Attachment::zip(archive))
}

#[post("/cancel-download/<task_id>")]
async fn cancel_download(task_id: &str, generator: &State<ArchiveGenerator>) -> (Status, Json<CancelReply>) {
    match generator.tasks().cancel(task_id).await {
        true => (Status::Ok, Json(CancelReply { status: "cancelled" })),
        false => (Status::NotFound, Json(CancelReply { status: "not_found" })),
    }
}

/// Builds the whole archive before responding; no progress, no cancellation.
#[get("/download-folder/<prefix..>")]
async fn download_folder(prefix: Segments<'_, Path>, generator: &State<ArchiveGenerator>) -> Result<Attachment, ApiError> {
    let archive = generator.build(&joined(prefix)).await?;
    Ok(Attachment::zip(archive))
}
