//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, MinIO, Backblaze B2, Tigris (Fly.io), and
//! others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via configuration (`key_id` and
//! `key_secret`); the AWS credential chain is not consulted.

use crate::{
    StorageBackend,
    error::{ErrorKind, Result},
    models::{ListPage, ObjectRecord},
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use exn::ResultExt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::instrument;

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// Upper bound on keys per listing page (the S3 API maximum).
const MAX_KEYS_PER_PAGE: i32 = 1000;

/// S3-compatible storage backend.
///
/// Always uses path-style addressing (`https://endpoint/bucket/key`), which
/// MinIO and most self-hosted services require.
///
/// # Examples
///
/// ```no_run
/// use bucketview_storage::backend::S3Backend;
///
/// # fn example() {
/// let backend = S3Backend::new(
///     "minio",
///     "my-bucket",
///     "us-east-1",
///     Some("http://localhost:9000"),
///     "access_key_id",
///     "secret_access_key",
/// );
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        let credentials = Credentials::new(key_id, key_secret, None, None, "bucketview-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.into(),
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        }
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("request limiter closed".to_string()))
    }

    /// Classify an SDK failure by the S3 error code, falling back to a network
    /// error for transport problems (no service response at all).
    fn map_sdk_error<E, R>(err: &SdkError<E, R>, key: &str) -> ErrorKind
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        match err.as_service_error().and_then(|e| e.code()) {
            Some("NoSuchKey" | "NotFound" | "NoSuchBucket") => ErrorKind::NotFound(key.to_string()),
            Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch") => {
                ErrorKind::PermissionDenied(key.to_string())
            },
            Some(code) => ErrorKind::BackendError(format!("{code}: {}", DisplayErrorContext(err))),
            None => ErrorKind::Network(DisplayErrorContext(err).to_string()),
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(backend = %self.name, bucket = %self.bucket))]
    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage> {
        let _permit = self.acquire_permit().await?;
        let mut request = self.client.list_objects_v2().bucket(&self.bucket).max_keys(MAX_KEYS_PER_PAGE);
        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }
        let response = request.send().await.map_err(|e| exn::Exn::from(Self::map_sdk_error(&e, prefix)))?;
        let records = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                // Negative sizes never come from a well-behaved service.
                let size = u64::try_from(object.size().unwrap_or(0)).unwrap_or(0);
                Some(ObjectRecord::new(key, size))
            })
            .collect();
        Ok(ListPage {
            records,
            is_truncated: response.is_truncated().unwrap_or(false),
            next_token: response.next_continuation_token().map(str::to_string),
        })
    }

    #[instrument(skip(self), fields(backend = %self.name, bucket = %self.bucket))]
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let _permit = self.acquire_permit().await?;
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| exn::Exn::from(Self::map_sdk_error(&e, key)))?;
        let body = response
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network(format!("interrupted reading body of {key}")))?;
        Ok(body.into_bytes().to_vec())
    }
}
