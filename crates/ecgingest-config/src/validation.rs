// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_request_config(&config.request)?;
    validate_storage_config(&config.storage)?;
    validate_registry_config(&config.registry)?;
    validate_readings_config(&config.readings)?;

    if config.fallback.path.trim().is_empty() {
        bail!("fallback.path must not be empty");
    }

    if let Some(ref server) = config.server {
        validate_server_config(server)?;
    }

    Ok(())
}

fn validate_request_config(config: &RequestConfig) -> Result<()> {
    if config.max_payload_bytes == 0 {
        bail!("request.max_payload_bytes must be greater than 0");
    }

    // Warn about very large payloads
    if config.max_payload_bytes > 100 * 1024 * 1024 {
        // 100 MB
        warn!(
            max_payload_bytes = config.max_payload_bytes,
            "request.max_payload_bytes is very large; may cause issues"
        );
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!("storage.fs.path must not be empty");
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.bucket.is_empty() {
                bail!("storage.s3.bucket is required for S3 backend");
            }

            if s3.region.is_empty() {
                bail!("storage.s3.region is required for S3 backend");
            }
        }
    }

    Ok(())
}

fn validate_registry_config(config: &RegistryConfig) -> Result<()> {
    if config.refresh_interval_secs == 0 {
        bail!("registry.refresh_interval_secs must be greater than 0");
    }

    if config.refresh_interval_secs < 60 {
        warn!(
            refresh_interval_secs = config.refresh_interval_secs,
            "registry.refresh_interval_secs is very short; every tick lists the whole user collection"
        );
    }

    if config.collection.is_empty() {
        bail!("registry.collection must not be empty");
    }

    if config.device_field.is_empty() {
        bail!("registry.device_field must not be empty");
    }

    Ok(())
}

fn validate_readings_config(config: &ReadingsConfig) -> Result<()> {
    if config.collection.is_empty() || config.sub_collection.is_empty() {
        bail!("readings.collection and readings.sub_collection must not be empty");
    }

    if config.collection.contains('/') || config.sub_collection.contains('/') {
        bail!("readings collection names must not contain '/'");
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    let Some((host, port)) = config.listen_addr.rsplit_once(':') else {
        bail!("server.listen_addr must be in format 'host:port'");
    };
    if host.is_empty() {
        bail!("server.listen_addr '{}' has no host", config.listen_addr);
    }
    if port.parse::<u16>().is_err() {
        bail!(
            "server.listen_addr '{}' has no valid port",
            config.listen_addr
        );
    }

    Ok(())
}
