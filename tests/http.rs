use bucketview_archive::ArchiveGenerator;
use bucketview_config::Config;
use bucketview_storage::backend::MockBackend;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::Value;
use std::io::{Cursor, Read};
use std::pin::pin;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use zip::ZipArchive;

fn sample_backend() -> MockBackend {
    MockBackend::with_files([
        ("a/b.txt", b"0123456789".to_vec()),
        ("a/c/d.txt", b"01234567890123456789".to_vec()),
        ("root.txt", b"01234".to_vec()),
    ])
}

async fn client(backend: MockBackend) -> Client {
    let mut config = Config::default();
    config.title = "Test Bucket".to_string();
    config.storage.bucket = "shared".to_string();
    let rocket = bucketview::rocket(config, Arc::new(backend)).unwrap();
    Client::tracked(rocket).await.unwrap()
}

/// The JSON payloads of a server-sent event stream, in order.
fn events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

fn zip_entries(data: Vec<u8>) -> Vec<(String, String)> {
    let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut contents = String::new();
            file.read_to_string(&mut contents).unwrap();
            (file.name().to_string(), contents)
        })
        .collect()
}

#[tokio::test]
async fn test_index_lists_tree() {
    let client = client(sample_backend()).await;
    let response = client.get("/").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::HTML));
    let html = response.into_string().await.unwrap();
    assert!(html.contains("<title>Test Bucket</title>"));
    assert!(html.contains("href=\"/download/root.txt\""));
    assert!(html.contains("href=\"/download/a/c/d.txt\""));
    assert!(html.contains("data-path=\"a/c\""));
}

#[tokio::test]
async fn test_index_lists_every_page() {
    let files: Vec<_> = (0..12).map(|i| (format!("f{i:02}.txt"), vec![0u8])).collect();
    let client = client(MockBackend::with_files(files).with_page_size(5)).await;
    let html = client.get("/").dispatch().await.into_string().await.unwrap();
    assert!(html.contains("f00.txt"));
    assert!(html.contains("f11.txt"));
    assert!(html.contains("12 files in 0 folders"));
}

#[tokio::test]
async fn test_index_storage_outage() {
    let backend = sample_backend();
    backend.set_unavailable(true);
    let client = client(backend).await;
    let response = client.get("/").dispatch().await;
    assert_eq!(response.status(), Status::InternalServerError);
}

#[tokio::test]
async fn test_download_object() {
    let client = client(sample_backend()).await;
    let response = client.get("/download/a/c/d.txt").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let disposition = response.headers().get_one("Content-Disposition").unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"d.txt\""));
    assert_eq!(response.content_type(), Some(ContentType::Binary));
    assert_eq!(response.into_bytes().await.unwrap(), b"01234567890123456789");
}

#[tokio::test]
async fn test_download_missing_object() {
    let client = client(sample_backend()).await;
    let response = client.get("/download/a/nope.txt").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
}

#[tokio::test]
async fn test_download_failure() {
    let client = client(sample_backend().with_failing_key("a/b.txt")).await;
    let response = client.get("/download/a/b.txt").dispatch().await;
    assert_eq!(response.status(), Status::InternalServerError);
}

#[tokio::test]
async fn test_folder_info() {
    let client = client(sample_backend()).await;
    let response = client.get("/folder-info/a/").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let info: Value = response.into_json().await.unwrap();
    assert_eq!(info["path"], "a");
    assert_eq!(info["file_count"], 2);
    assert_eq!(info["subfolder_count"], 1);
    assert_eq!(info["total_size_bytes"], 30);
    assert_eq!(info["total_size"], "30.00 B");
}

#[tokio::test]
async fn test_progress_then_fetch_archive() {
    let client = client(sample_backend()).await;
    let body = client.get("/download-folder-progress/a?task_id=t1").dispatch().await.into_string().await.unwrap();
    let events = events(&body);
    let statuses: Vec<_> = events.iter().map(|e| e["status"].as_str().unwrap()).collect();
    assert_eq!(statuses, vec!["progress", "progress", "complete"]);
    assert_eq!((events[0]["current"].as_u64(), events[0]["total"].as_u64()), (Some(1), Some(2)));
    assert_eq!(events[2]["file_count"], 2);

    let response = client.get("/get-zip/t1").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::ZIP));
    let disposition = response.headers().get_one("Content-Disposition").unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"a.zip\""));
    assert_eq!(zip_entries(response.into_bytes().await.unwrap()), vec![
        ("b.txt".to_string(), "0123456789".to_string()),
        ("c/d.txt".to_string(), "01234567890123456789".to_string()),
    ]);

    // Still retrievable until the eviction delay passes.
    assert_eq!(client.get("/get-zip/t1").dispatch().await.status(), Status::Ok);
}

#[tokio::test]
async fn test_progress_for_empty_folder() {
    let client = client(sample_backend()).await;
    let body = client.get("/download-folder-progress/missing?task_id=t1").dispatch().await.into_string().await.unwrap();
    let events = events(&body);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["status"], "error");
    assert!(events[0]["message"].as_str().unwrap().contains("no files found"));

    let generator = client.rocket().state::<ArchiveGenerator>().unwrap();
    assert!(generator.tasks().is_empty().await);
}

#[tokio::test]
async fn test_progress_reports_skipped_objects() {
    let client = client(sample_backend().with_failing_key("a/b.txt")).await;
    let body = client.get("/download-folder-progress/a?task_id=t1").dispatch().await.into_string().await.unwrap();
    let events = events(&body);
    assert_eq!(events[0]["status"], "skipped");
    assert_eq!(events[0]["key"], "a/b.txt");
    assert_eq!(events.last().unwrap()["status"], "complete");
    assert_eq!(events.last().unwrap()["file_count"], 1);
}

#[tokio::test]
async fn test_progress_reports_storage_cause() {
    let backend = sample_backend();
    backend.set_unavailable(true);
    let client = client(backend).await;
    let body = client.get("/download-folder-progress/a?task_id=t1").dispatch().await.into_string().await.unwrap();
    let events = events(&body);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["status"], "error");
    assert_eq!(events[0]["message"], "could not list folder contents: storage unavailable: mock is unavailable");
}

#[tokio::test]
async fn test_cancel_running_progress_stream() {
    let files: Vec<_> = (0..20).map(|i| (format!("big/{i:02}.txt"), vec![b'x'; 64])).collect();
    let client = client(MockBackend::with_files(files)).await;
    let mut response = pin!(client.get("/download-folder-progress/big?task_id=t1").dispatch().await);

    // Read up to the end of the first event; the rest is produced on demand.
    let mut received = Vec::new();
    let mut chunk = [0u8; 16];
    while !received.windows(2).any(|w| w == b"\n\n") {
        let read = response.read(&mut chunk).await.unwrap();
        assert!(read > 0, "stream ended before the first event");
        received.extend_from_slice(&chunk[..read]);
    }

    let cancel = client.post("/cancel-download/t1").dispatch().await;
    assert_eq!(cancel.status(), Status::Ok);

    response.read_to_end(&mut received).await.unwrap();
    let events = events(&String::from_utf8(received).unwrap());
    assert_eq!(events[0]["status"], "progress");
    assert_eq!(events.last().unwrap()["status"], "cancelled");
    assert!(events.iter().all(|e| e["status"] != "complete"));

    assert_eq!(client.get("/get-zip/t1").dispatch().await.status(), Status::NotFound);
    let generator = client.rocket().state::<ArchiveGenerator>().unwrap();
    assert!(generator.tasks().is_empty().await);
}

#[tokio::test]
async fn test_cancel_unknown_task() {
    let client = client(sample_backend()).await;
    let response = client.post("/cancel-download/nope").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    let reply: Value = response.into_json().await.unwrap();
    assert_eq!(reply["status"], "not_found");
}

#[tokio::test]
async fn test_cancel_pending_task() {
    let client = client(sample_backend()).await;
    let generator = client.rocket().state::<ArchiveGenerator>().unwrap();
    generator.tasks().create("t1").await.unwrap();

    let response = client.post("/cancel-download/t1").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let reply: Value = response.into_json().await.unwrap();
    assert_eq!(reply["status"], "cancelled");
    assert!(generator.tasks().is_cancelled("t1").await);

    // Registered but never completed.
    let response = client.get("/get-zip/t1").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    assert!(response.into_string().await.unwrap().starts_with("download not ready"));
}

#[tokio::test]
async fn test_get_zip_unknown_task() {
    let client = client(sample_backend()).await;
    let response = client.get("/get-zip/nope").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(response.into_string().await.unwrap(), "download not found or expired: nope");
}

#[tokio::test]
async fn test_legacy_folder_download() {
    let client = client(sample_backend()).await;
    let response = client.get("/download-folder/a/c").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let disposition = response.headers().get_one("Content-Disposition").unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"c.zip\""));
    assert_eq!(zip_entries(response.into_bytes().await.unwrap()), vec![(
        "d.txt".to_string(),
        "01234567890123456789".to_string()
    )]);

    let generator = client.rocket().state::<ArchiveGenerator>().unwrap();
    assert!(generator.tasks().is_empty().await);
}

#[tokio::test]
async fn test_legacy_download_of_empty_folder() {
    let client = client(sample_backend()).await;
    let response = client.get("/download-folder/missing").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    assert!(response.into_string().await.unwrap().starts_with("no files found in folder"));
}

#[tokio::test]
async fn test_legacy_download_storage_outage() {
    let backend = sample_backend();
    backend.set_unavailable(true);
    let client = client(backend).await;
    let response = client.get("/download-folder/a").dispatch().await;
    assert_eq!(response.status(), Status::InternalServerError);
    assert_eq!(
        response.into_string().await.unwrap(),
        "could not list folder contents: storage unavailable: mock is unavailable"
    );
}

#[tokio::test]
async fn test_download_without_key() {
    let client = client(sample_backend()).await;
    let response = client.get("/download/").dispatch().await;
    assert_eq!(response.status(), Status::BadRequest);
}
