//! syncsrv binary entry point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use common::logging::{self, LogConfig};
use common::SqliteClient;
use syncsrv::api::{self, ApiState};
use syncsrv::config::{Config, DEFAULT_CONFIG_PATH};
use syncsrv::engine::SyncEngine;
use syncsrv::status::SyncStatus;
use syncsrv::storage::sqlite::{SqliteDestinationStore, SqliteSourceStore};
use syncsrv::storage::DestinationStore;
use syncsrv::{SERVICE_NAME, SERVICE_VERSION};

#[derive(Parser, Debug)]
#[command(name = "syncsrv")]
#[command(about = "Incremental pivot-sync service", version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SYNCSRV_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Validate configuration and store connectivity, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config =
        Config::load(&args.config).with_context(|| format!("loading {}", args.config))?;

    let mut log_config = LogConfig::new(SERVICE_NAME);
    log_config.default_filter = format!("info,{}={}", SERVICE_NAME, config.service.log_level);
    log_config.log_dir = config.service.log_dir.clone();
    log_config.enable_json = config.service.log_json;
    let _log_guard = logging::init(&log_config)?;

    info!("Starting {} v{}", SERVICE_NAME, SERVICE_VERSION);

    let dict = config.dictionary();

    // The source belongs to another process; open it read-only
    let source_client = SqliteClient::new_readonly(&config.source.db_path)
        .await
        .context("opening source database")?;
    let destination_client = SqliteClient::new(&config.destination.db_path)
        .await
        .context("opening destination database")?;

    let source = Arc::new(SqliteSourceStore::new(
        source_client.clone(),
        &config.source.table,
    ));
    let destination = Arc::new(SqliteDestinationStore::new(
        destination_client.clone(),
        &config.destination.table,
        dict.clone(),
    ));

    if args.check {
        source_client
            .ping()
            .await
            .context("source database unreachable")?;
        destination_client
            .ping()
            .await
            .context("destination database unreachable")?;
        if !source.table_exists().await? {
            anyhow::bail!(
                "source table '{}' does not exist in {}",
                config.source.table,
                config.source.db_path
            );
        }
        println!(
            "configuration OK: {} tags, source '{}', destination '{}'",
            dict.len(),
            config.source.table,
            config.destination.table
        );
        return Ok(());
    }

    // One-time provisioning; the sync cycle itself never touches schema
    destination
        .ensure_schema()
        .await
        .context("creating destination table")?;
    if !source.table_exists().await? {
        warn!(
            "Source table '{}' does not exist yet; cycles will fail until it appears",
            config.source.table
        );
    }

    let status = Arc::new(SyncStatus::new());
    let engine = Arc::new(SyncEngine::new(
        source,
        destination,
        dict,
        status.clone(),
        Duration::from_secs(config.service.poll_interval_secs),
        config.source.fetch_chunk_size,
    ));
    let state = Arc::new(ApiState::new(engine, status));

    if config.service.autostart {
        state.start_loop();
    } else {
        info!("Sync loop idle; POST /api/sync/start to begin");
    }

    let app = api::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.service.api_bind)
        .await
        .with_context(|| format!("binding {}", config.service.api_bind))?;
    info!("Control API listening on {}", config.service.api_bind);

    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            tracing::error!("API server error: {}", e);
        }
    });

    common::shutdown::wait_for_shutdown().await;
    info!("Received shutdown signal");

    // Let an in-flight cycle finish before tearing the process down
    state.shutdown().await;
    api_handle.abort();
    let _ = api_handle.await;

    info!("{} stopped", SERVICE_NAME);
    Ok(())
}
