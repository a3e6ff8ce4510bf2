use bucketview::error::{ErrorKind, Result};
use bucketview_config::Config;
use bucketview_storage::backend::S3Backend;
use clap::Parser;
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Browse an S3-compatible bucket as a folder tree.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML); defaults to `config.toml` in the platform
    /// configuration directory.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Address to listen on.
    #[arg(long)]
    address: Option<String>,
    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bucketview=info")))
        .with_target(true)
        .init();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Exiting");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(address) = cli.address {
        config.server.address = address;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    let storage = &config.storage;
    let backend = S3Backend::new(
        "s3",
        &storage.bucket,
        &storage.region,
        storage.endpoint.as_deref(),
        &storage.key_id,
        &storage.key_secret,
    );
    tracing::info!(address = %config.server.address, port = config.server.port, "Starting");
    let rocket = bucketview::rocket(config, Arc::new(backend))?;
    if let Err(e) = rocket.launch().await {
        tracing::error!(error = %e, "Server failed");
        exn::bail!(ErrorKind::Server);
    }
    Ok(())
}
