// src/main.rs

//! blaulicht: Police report feed harvester
//!
//! Runs the harvest loop and serves the materialized feeds over HTTP.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use blaulicht::error::Result;
use blaulicht::feed::{FeedChannel, FeedMaterializer};
use blaulicht::models::Config;
use blaulicht::pipeline::{self, HarvestContext};
use blaulicht::server;
use blaulicht::services::RateLimitedFetcher;
use blaulicht::storage::{RecordStore, SqliteStore};

/// blaulicht - Berlin police report feed harvester
#[derive(Parser, Debug)]
#[command(
    name = "blaulicht",
    version,
    about = "Harvests Berlin police incident reports and serves them as feeds"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("blaulicht starting...");

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env()?;
    config.validate()?;
    let config = Arc::new(config);

    // No store, no service: an unreachable database is fatal here.
    let store: Arc<dyn RecordStore> =
        Arc::new(SqliteStore::open(Path::new(&config.store.db_path)).await?);
    log::info!("Opened record store at {}", config.store.db_path);

    let cutoff = Utc::now().timestamp() - config.store.retention_secs();
    let pruned = store.delete_older_than(cutoff).await?;
    if pruned > 0 {
        log::info!("Pruned {} expired records at startup", pruned);
    }

    let fetcher = Arc::new(RateLimitedFetcher::new(&config.fetch)?);
    let materializer = Arc::new(FeedMaterializer::new(FeedChannel::from_config(&config))?);

    // Serve whatever the store already holds before the first pass runs.
    let records = store.list_all().await?;
    materializer.rebuild(&records).await?;
    log::info!("Feed materialized with {} stored records", records.len());

    let ctx = Arc::new(HarvestContext::new(
        Arc::clone(&config),
        fetcher,
        store,
        Arc::clone(&materializer),
    ));

    // Pass 0 runs before the interval loop so the first serve is fresh.
    // Its failure is a pass failure like any other, not a startup failure.
    if let Err(e) = pipeline::run_pass(&ctx).await {
        log::error!("Initial harvest pass failed: {}", e);
    }

    let cancel = CancellationToken::new();

    let scheduler = {
        let ctx = Arc::clone(&ctx);
        let cancel = cancel.clone();
        let interval = Duration::from_secs(config.harvest.interval_secs);
        tokio::spawn(async move {
            pipeline::run_scheduler(interval, cancel, move || {
                let ctx = Arc::clone(&ctx);
                async move { pipeline::run_pass(&ctx).await }
            })
            .await;
        })
    };

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutdown signal received");
                cancel.cancel();
            }
        });
    }

    server::serve(config.server.port, materializer, cancel).await?;

    scheduler.await.ok();
    log::info!("Shutting down...");

    Ok(())
}
