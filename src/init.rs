// Initialization utilities for server mode
//
// Storage backend, fallback log, registry and logging/tracing setup

use anyhow::{Context, Result};
use ecgingest_config::{LogFormat, RuntimeConfig};
use ecgingest_handlers::IngestionPipeline;
use ecgingest_registry::{DeviceRegistryCache, DocumentRegistrySource};
use ecgingest_writer::{document_store_from_config, DocumentStore, FallbackStore};
use std::sync::Arc;
use tracing::info;

/// Wire the document store, fallback log and device registry into a pipeline.
///
/// The registry starts empty; the refresh scheduler's first tick fills it.
pub async fn init_pipeline(config: &RuntimeConfig) -> Result<Arc<IngestionPipeline>> {
    info!(
        "Initializing document store with storage backend: {}",
        config.storage.backend
    );
    let store: Arc<dyn DocumentStore> = Arc::new(
        document_store_from_config(&config.storage)
            .context("Failed to initialize document store")?,
    );

    let fallback = FallbackStore::open(&config.fallback.path)
        .await
        .with_context(|| format!("Failed to open fallback log {}", config.fallback.path))?;
    info!("Fallback log at: {}", fallback.path().display());

    let source = DocumentRegistrySource::new(
        Arc::clone(&store),
        config.registry.collection.as_str(),
        config.registry.device_field.as_str(),
    );
    let registry = Arc::new(DeviceRegistryCache::new(Arc::new(source)));

    Ok(Arc::new(IngestionPipeline::new(
        registry,
        store,
        Arc::new(fallback),
        config.readings.clone(),
    )))
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let server = config.server.clone().unwrap_or_default();

    // Parse log level from config
    let env_filter =
        EnvFilter::try_new(&server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match server.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
