//! Object storage access for bucketview.
//!
//! Buckets are flat: a key such as `reports/2024/q1.csv` is a single opaque
//! identifier, and "folders" only exist by the `/` convention. This crate
//! exposes the two operations the rest of the workspace needs from a bucket
//! (paginated listing and whole-object reads) behind [`StorageBackend`], plus
//! the key helpers that give the folder convention its meaning.

pub mod backend;
pub mod error;
pub mod key;
mod models;

pub use crate::backend::StorageBackend;
pub use crate::models::{ListPage, ObjectRecord};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
