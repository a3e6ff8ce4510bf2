//! Bucketview: browse an S3-compatible bucket as a folder tree.
//!
//! The service lists the bucket, renders the implied folder hierarchy, serves
//! single objects, summarizes folders, and packs folders into zip archives:
//! either in one request, or in the background with a server-sent progress
//! stream, cancellation, and a separate request to fetch the result.

pub mod error;
mod render;
mod response;
mod routes;

pub use crate::render::Renderer;
use crate::error::Result;
use bucketview_archive::{ArchiveGenerator, CompressionPolicy, TaskManager};
use bucketview_config::Config;
use bucketview_storage::BackendHandle;
use rocket::config::LogLevel;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use std::sync::Arc;

/// Assembles the service around `backend`.
///
/// Listen address and port come from `config`; everything else rocket reads
/// from its usual `ROCKET_*` sources. Request logging is left to `tracing`.
pub fn rocket(config: Config, backend: BackendHandle) -> Result<Rocket<Build>> {
    let tasks = Arc::new(TaskManager::new());
    let generator = ArchiveGenerator::new(backend.clone(), tasks)
        .with_policy(CompressionPolicy::new(config.archive.store_threshold))
        .with_retention(config.archive.retention());
    let renderer = Renderer::new()?;
    let figment = rocket::Config::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port))
        .merge(("log_level", LogLevel::Critical));
    tracing::info!(
        bucket = %config.storage.bucket,
        backend = backend.name(),
        store_threshold = config.archive.store_threshold,
        "Service configured"
    );
    Ok(rocket::custom(figment)
        .manage(config)
        .manage(backend)
        .manage(generator)
        .manage(renderer)
        .mount("/", routes::routes())
        .attach(AdHoc::on_shutdown("Cancel pending evictions", |rocket| {
            Box::pin(async move {
                if let Some(generator) = rocket.state::<ArchiveGenerator>() {
                    generator.tasks().shutdown();
                }
            })
        })))
}
