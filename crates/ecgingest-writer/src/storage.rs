//! Storage operator initialization
//!
//! Builds the OpenDAL operator behind the remote document store from
//! `StorageConfig`. The operator is returned to the caller and owned by the
//! server state; nothing is kept in process-wide statics.

use crate::document::OpenDalDocumentStore;
use crate::error::{Result, WriterError};
use ecgingest_config::{StorageBackend, StorageConfig};
use opendal::{services, Operator};
use serde::Deserialize;
use tracing::info;

/// Contents of the file named by `storage.credentials_path`
#[derive(Debug, Deserialize)]
struct StoredCredentials {
    access_key_id: String,
    secret_access_key: String,
}

fn load_credentials(path: &str) -> Result<StoredCredentials> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        WriterError::invalid_config(format!("Failed to read credentials file {}: {}", path, e))
    })?;
    toml::from_str(&content).map_err(|e| {
        WriterError::invalid_config(format!("Failed to parse credentials file {}: {}", path, e))
    })
}

/// Create an OpenDAL operator for the configured backend.
pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                WriterError::invalid_config("fs config required for filesystem backend")
            })?;
            info!("Using filesystem document store at: {}", fs.path);

            let builder = services::Fs::default().root(&fs.path);
            Operator::new(builder)
                .map(|b| b.finish())
                .map_err(|e| WriterError::storage(fs.path.clone(), e))
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| WriterError::invalid_config("s3 config required for S3 backend"))?;
            info!(
                "Using S3 document store: bucket={}, region={}",
                s3.bucket, s3.region
            );

            let mut builder = services::S3::default()
                .bucket(&s3.bucket)
                .region(&s3.region);

            if let Some(endpoint) = &s3.endpoint {
                builder = builder.endpoint(endpoint);
            }

            let file_credentials = match &config.credentials_path {
                Some(path) => Some(load_credentials(path)?),
                None => None,
            };

            // Inline keys win over the credentials file; with neither, OpenDAL
            // falls back to the standard AWS credential chain.
            let access_key_id = s3
                .access_key_id
                .as_deref()
                .or(file_credentials.as_ref().map(|c| c.access_key_id.as_str()));
            let secret_access_key = s3
                .secret_access_key
                .as_deref()
                .or(file_credentials.as_ref().map(|c| c.secret_access_key.as_str()));

            if let Some(key) = access_key_id {
                builder = builder.access_key_id(key);
            }
            if let Some(secret) = secret_access_key {
                builder = builder.secret_access_key(secret);
            }

            Operator::new(builder)
                .map(|b| b.finish())
                .map_err(|e| WriterError::storage(s3.bucket.clone(), e))
        }
    }
}

/// Build the document store (operator plus optional key prefix) for `config`.
pub fn document_store_from_config(config: &StorageConfig) -> Result<OpenDalDocumentStore> {
    let operator = build_operator(config)?;
    let prefix = match config.backend {
        StorageBackend::S3 => config.s3.as_ref().and_then(|s3| s3.prefix.clone()),
        StorageBackend::Fs => None,
    };
    Ok(OpenDalDocumentStore::new(operator).with_prefix(prefix))
}
