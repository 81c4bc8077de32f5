use std::net::SocketAddr;
use std::sync::Arc;

use aggregator::aircraft::AircraftRecord;
use aggregator::config::{AggregatorConfig, StorageBackend};
use aggregator::eviction::{EvictionConfig, spawn_eviction_task};
use aggregator::feed::{FeedConfig, spawn_feed_reader};
use aggregator::lookup::HttpMetadataLookup;
use aggregator::queue::{AircraftStorage, spawn_writer_task};
use aggregator::status::spawn_status_server;
use aggregator::storage::{Archive, BTreeStorage, MapStorage, SystemClock};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aggregator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match AggregatorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: feed={}:{}, database={}, backend={:?}",
        config.feed_host,
        config.feed_port,
        config.database_directory.join(&config.database_filename).display(),
        config.storage_backend,
    );

    let archive = match Archive::open(&config.database_directory, &config.database_filename) {
        Ok(archive) => Arc::new(archive),
        Err(e) => {
            tracing::error!("Failed to open archive: {e}");
            std::process::exit(1);
        }
    };

    let storage: AircraftStorage = match config.storage_backend {
        StorageBackend::BTree => match BTreeStorage::<AircraftRecord>::new(config.storage_degree) {
            Ok(tree) => Arc::new(tree),
            Err(e) => {
                tracing::error!("Failed to create storage: {e}");
                std::process::exit(1);
            }
        },
        StorageBackend::Map => Arc::new(MapStorage::<AircraftRecord>::new()),
    };

    let lookup = Arc::new(HttpMetadataLookup::new(
        config.lookup_addr.clone(),
        config.lookup_timeout,
    ));
    let (writer, writer_task) =
        spawn_writer_task(storage, lookup, Arc::new(SystemClock), config.queue_capacity);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed_config = FeedConfig {
        read_timeout: config.read_timeout,
        ..FeedConfig::new(config.feed_host.clone(), config.feed_port)
    };
    let reader_task = spawn_feed_reader(feed_config, writer.clone(), shutdown_rx.clone());

    let eviction_config = EvictionConfig {
        stale_after: config.stale_after,
        sweep_interval: config.sweep_interval,
    };
    let eviction_task = spawn_eviction_task(
        writer.clone(),
        Arc::clone(&archive),
        eviction_config,
        shutdown_rx.clone(),
    );

    let status_task = match config.status_port {
        Some(port) => {
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("Failed to bind status API: {e}");
                    std::process::exit(1);
                });
            tracing::info!("status API listening on {addr}");
            Some(spawn_status_server(listener, writer.clone(), shutdown_rx))
        }
        None => None,
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);

    if let Err(e) = reader_task.await {
        tracing::error!("feed reader panicked: {e}");
    }
    if let Some(task) = status_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("status API failed: {e}"),
            Err(e) => tracing::error!("status API panicked: {e}"),
        }
    }
    match eviction_task.await {
        Ok(report) => tracing::info!(
            evicted = report.evicted,
            refreshed = report.refreshed,
            failed = report.failed,
            "eviction stopped"
        ),
        Err(e) => tracing::error!("eviction task panicked: {e}"),
    }

    // The writer drains once the last handle is gone.
    drop(writer);
    match writer_task.await {
        Ok(stats) => tracing::info!(
            messages = stats.messages,
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            "writer stopped"
        ),
        Err(e) => tracing::error!("writer task panicked: {e}"),
    }

    match archive.count() {
        Ok(rows) => tracing::info!(rows, "archive closed"),
        Err(e) => tracing::error!("Failed to read archive: {e}"),
    }
}
