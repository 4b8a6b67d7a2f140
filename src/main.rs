//! QuickDrop - file sharing with resumable uploads
//!
//! Runs the upload session protocol server.

use clap::Parser;
use quickdrop::blob::S3BlobStore;
use quickdrop::store::MemoryStore;
use quickdrop::{config::Config, server::Server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// QuickDrop - file sharing service with resumable chunked uploads
#[derive(Parser, Debug)]
#[command(name = "quickdrop")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting QuickDrop v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);

    let blob = Arc::new(S3BlobStore::new(&config.storage).await);
    let store = Arc::new(MemoryStore::new());

    let server = Server::bind(config, store, blob).await?;
    server.run().await?;

    Ok(())
}
