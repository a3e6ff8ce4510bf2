//! Configuration loading and validation for bucketview.
//!
//! Settings are layered with [figment], lowest precedence first:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A TOML file: the path given on the command line, otherwise
//!    `config.toml` in the platform configuration directory (if present).
//! 3. `BUCKETVIEW_`-prefixed environment variables, with `__` separating
//!    nested keys (e.g. `BUCKETVIEW_STORAGE__BUCKET=photos`).
//! 4. The flat variables existing deployments already set: `ENDPOINT_URL`,
//!    `BUCKET_NAME`, `ACCESS_KEY`, `SECRET_KEY`, `REGION` and `APP_TITLE`.
//!
//! ```toml
//! title = "Team Bucket"
//!
//! [storage]
//! endpoint = "http://minio.internal:9000"
//! bucket = "shared"
//! key_id = "..."
//! key_secret = "..."
//!
//! [archive]
//! store_threshold = 100
//! eviction_delay_secs = 60
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "BUCKETVIEW_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Page title shown in the browser.
    pub title: String,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub archive: ArchiveConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Bucket Browser".to_string(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Custom endpoint for S3-compatible services; `None` means AWS.
    pub endpoint: Option<String>,
    pub bucket: String,
    pub region: String,
    pub key_id: String,
    pub key_secret: String,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: String::new(),
            region: "us-east-1".to_string(),
            key_id: String::new(),
            key_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: "0.0.0.0".to_string(), port: 5000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Listings with more objects than this are archived without compression.
    pub store_threshold: usize,
    /// How long a finished archive stays retrievable after its first download.
    pub eviction_delay_secs: u64,
    /// How long a finished archive is kept, downloaded or not.
    pub retention_secs: u64,
}
impl Default for ArchiveConfig {
    fn default() -> Self {
        Self { store_threshold: 100, eviction_delay_secs: 60, retention_secs: 600 }
    }
}
impl ArchiveConfig {
    pub fn eviction_delay(&self) -> Duration {
        Duration::from_secs(self.eviction_delay_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Config {
    /// Loads and validates configuration.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path
            && !path.is_file()
        {
            exn::bail!(ErrorKind::FileNotFound(path.to_path_buf()));
        }
        let file = path.map(Path::to_path_buf).or_else(default_path);
        if let Some(file) = &file {
            tracing::debug!(path = %file.display(), "Reading configuration file (if present)");
        }
        let config: Self = Self::figment(file.as_deref()).extract().or_raise(|| ErrorKind::Invalid)?;
        config.validate()?;
        Ok(config)
    }

    /// The layered provider chain, exposed so callers can add their own
    /// layers on top (e.g. command-line overrides).
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__")).merge(legacy_env())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.bucket.trim().is_empty() {
            exn::bail!(ErrorKind::Missing("storage.bucket"));
        }
        if self.storage.key_id.is_empty() {
            exn::bail!(ErrorKind::Missing("storage.key_id"));
        }
        if self.storage.key_secret.is_empty() {
            exn::bail!(ErrorKind::Missing("storage.key_secret"));
        }
        if self.archive.eviction_delay_secs == 0 {
            exn::bail!(ErrorKind::OutOfRange("archive.eviction_delay_secs"));
        }
        Ok(())
    }
}

/// `config.toml` in the platform configuration directory.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "bucketview").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn legacy_env() -> Env {
    Env::raw().filter_map(|key| match key.as_str().to_ascii_uppercase().as_str() {
        "ENDPOINT_URL" => Some("storage.endpoint".into()),
        "BUCKET_NAME" => Some("storage.bucket".into()),
        "ACCESS_KEY" => Some("storage.key_id".into()),
        "SECRET_KEY" => Some("storage.key_secret".into()),
        "REGION" => Some("storage.region".into()),
        "APP_TITLE" => Some("title".into()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn with_credentials(jail: &mut Jail) {
        jail.set_env("BUCKET_NAME", "shared");
        jail.set_env("ACCESS_KEY", "id");
        jail.set_env("SECRET_KEY", "secret");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.archive.store_threshold, 100);
        assert_eq!(config.archive.eviction_delay(), Duration::from_secs(60));
        assert_eq!(config.storage.region, "us-east-1");
    }

    #[test]
    fn test_legacy_variables() {
        Jail::expect_with(|jail| {
            with_credentials(jail);
            jail.set_env("ENDPOINT_URL", "http://localhost:9000");
            jail.set_env("APP_TITLE", "MinIO Browser");
            let config: Config = Config::figment(None).extract()?;
            assert_eq!(config.storage.bucket, "shared");
            assert_eq!(config.storage.key_id, "id");
            assert_eq!(config.storage.key_secret, "secret");
            assert_eq!(config.storage.endpoint.as_deref(), Some("http://localhost:9000"));
            assert_eq!(config.title, "MinIO Browser");
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_prefixed_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                title = "From File"
                [storage]
                bucket = "file-bucket"
                [archive]
                store_threshold = 10
                "#,
            )?;
            jail.set_env("BUCKETVIEW_STORAGE__BUCKET", "env-bucket");
            jail.set_env("BUCKETVIEW_SERVER__PORT", "8080");
            let config: Config = Config::figment(Some(Path::new("config.toml"))).extract()?;
            assert_eq!(config.title, "From File");
            assert_eq!(config.storage.bucket, "env-bucket");
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.archive.store_threshold, 10);
            assert_eq!(config.archive.eviction_delay_secs, 60);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_missing_file() {
        Jail::expect_with(|_jail| {
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::FileNotFound(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case("BUCKET_NAME", "storage.bucket")]
    #[case("ACCESS_KEY", "storage.key_id")]
    #[case("SECRET_KEY", "storage.key_secret")]
    fn test_missing_required(#[case] unset: &str, #[case] setting: &'static str) {
        Jail::expect_with(|jail| {
            with_credentials(jail);
            jail.set_env(unset, "");
            let config: Config = Config::figment(None).extract()?;
            let err = config.validate().unwrap_err();
            assert!(matches!(&*err, ErrorKind::Missing(name) if *name == setting));
            Ok(())
        });
    }

    #[test]
    fn test_zero_eviction_delay_rejected() {
        Jail::expect_with(|jail| {
            with_credentials(jail);
            jail.set_env("BUCKETVIEW_ARCHIVE__EVICTION_DELAY_SECS", "0");
            let config: Config = Config::figment(None).extract()?;
            assert!(matches!(&*config.validate().unwrap_err(), ErrorKind::OutOfRange(_)));
            Ok(())
        });
    }
}
