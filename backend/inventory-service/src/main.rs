//! Inventory Service - Main entry point
//!
//! Consumes product and cart events, keeps thumbnails and stock levels in
//! the record store up to date, and serves `/health` and `/metrics`.

use anyhow::{Context, Result};
use inventory_service::http;
use inventory_service::kafka::{ConsumerState, InventoryConsumer, KafkaEventSource, KafkaSourceConfig};
use inventory_service::services::{
    EventHandler, HandlerConfig, HttpImageFetcher, QuantityAdjuster, ThumbnailConfig,
    ThumbnailProcessor, ThumbnailService,
};
use inventory_service::store::{PgRecordStore, RecordStore};
use inventory_service::{Config, S3BlobStore};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "inventory_service=info,resilience=info,rdkafka=warn,info";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting Inventory Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    info!(
        topic = %config.kafka_topic,
        group_id = %config.kafka_group_id,
        bucket = %config.blob_bucket,
        batch_max_size = config.batch_max_size,
        "Configuration loaded"
    );

    let pg_store = PgRecordStore::connect(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to record store")?;
    pg_store
        .migrate()
        .await
        .context("Failed to run record store migrations")?;
    let store: Arc<dyn RecordStore> = Arc::new(pg_store);
    info!("Record store ready");

    let blobs = Arc::new(
        S3BlobStore::from_config(&config)
            .await
            .context("Failed to initialize blob store")?,
    );
    let fetcher = Arc::new(
        HttpImageFetcher::new(config.io_timeout()).context("Failed to build image fetcher")?,
    );
    let processor = Arc::new(ThumbnailProcessor::new(ThumbnailConfig {
        width: config.thumbnail_width,
        height: config.thumbnail_height,
        quality: config.thumbnail_quality,
    }));

    let thumbnails = ThumbnailService::new(fetcher, processor, blobs, config.io_timeout());
    let adjuster = QuantityAdjuster::new(store.clone(), config.io_timeout(), config.conflict_retry());
    let handler = Arc::new(EventHandler::new(
        store,
        thumbnails,
        adjuster,
        HandlerConfig {
            io_timeout: config.io_timeout(),
            event_timeout: config.event_timeout(),
            event_retry: config.event_retry(),
        },
    ));

    let source = KafkaEventSource::new(KafkaSourceConfig::from_config(&config));
    let consumer = InventoryConsumer::new(source, handler, config.reconnect());
    let state = consumer.state();

    let server = http::serve(config.http_port, state).context("Failed to bind HTTP server")?;
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut consumer_task = tokio::spawn(consumer.run(async move {
        let _ = shutdown_rx.await;
    }));

    info!("Inventory Service ready");

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        result = &mut consumer_task => Some(result),
    };

    let final_state = match finished {
        None => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            consumer_task.await.context("Consumer task panicked")?
        }
        Some(result) => {
            let state = result.context("Consumer task panicked")?;
            if state == ConsumerState::Faulted {
                // Stay up so /health keeps reporting the fault to the supervisor
                warn!("Consumer faulted, serving degraded health until shutdown");
                tokio::signal::ctrl_c()
                    .await
                    .context("Failed to listen for shutdown signal")?;
            }
            state
        }
    };

    server_handle.stop(true).await;
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server error"),
        Err(e) => error!(error = %e, "HTTP server task failed"),
    }

    info!(state = final_state.as_str(), "Inventory Service stopped");
    Ok(())
}
