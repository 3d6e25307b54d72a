use super::{FsConfig, LogFormat, RuntimeConfig, S3Config, ServerConfig, StorageBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "ECGINGEST_";

/// Abstraction over environment-variable lookups so tests (and embedders)
/// can supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the ECGINGEST_ prefix
    /// Used for AWS standard variables (AWS_ACCESS_KEY_ID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Server configuration (listen addr, log level/format)
    if let Some(addr) = get_env_string(env, "LISTEN_ADDR")? {
        ensure_server(config).listen_addr = addr;
    }
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        ensure_server(config).log_level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        let parsed = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        ensure_server(config).log_format = parsed;
    }

    // Request configuration
    if let Some(val) = get_env_usize(env, "MAX_PAYLOAD_BYTES")? {
        config.request.max_payload_bytes = val;
    }

    // Device registry
    if let Some(val) = get_env_u64(env, "REFRESH_INTERVAL_SECS")? {
        config.registry.refresh_interval_secs = val;
    }
    if let Some(collection) = get_env_string(env, "REGISTRY_COLLECTION")? {
        config.registry.collection = collection;
    }
    if let Some(field) = get_env_string(env, "REGISTRY_DEVICE_FIELD")? {
        config.registry.device_field = field;
    }

    // Readings and fallback log
    if let Some(collection) = get_env_string(env, "READINGS_COLLECTION")? {
        config.readings.collection = collection;
    }
    if let Some(path) = get_env_string(env, "FALLBACK_PATH")? {
        config.fallback.path = path;
    }

    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND")? {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid ECGINGEST_STORAGE_BACKEND value")?;
    }
    if let Some(path) = get_env_string(env, "CREDENTIALS_PATH")? {
        config.storage.credentials_path = Some(path);
    }

    // Filesystem storage
    if let Some(path) = get_env_string(env, "STORAGE_PATH")? {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // S3 storage
    if let Some(bucket) = get_env_string(env, "S3_BUCKET")? {
        ensure_s3(config).bucket = bucket;
    }
    if let Some(region) = get_env_string(env, "S3_REGION")? {
        ensure_s3(config).region = region;
    }
    if let Some(endpoint) = get_env_string(env, "S3_ENDPOINT")? {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(prefix) = get_env_string(env, "S3_PREFIX")? {
        ensure_s3(config).prefix = normalize_prefix(prefix);
    }

    // AWS standard credentials (without ECGINGEST_ prefix for compatibility).
    // Only applied when the S3 backend is in use.
    if config.storage.backend == StorageBackend::S3 {
        if let Some(access_key_id) = get_raw_env_string(env, "AWS_ACCESS_KEY_ID")? {
            ensure_s3(config).access_key_id = Some(access_key_id);
        }
        if let Some(secret_access_key) = get_raw_env_string(env, "AWS_SECRET_ACCESS_KEY")? {
            ensure_s3(config).secret_access_key = Some(secret_access_key);
        }
        if let Some(endpoint) = get_raw_env_string(env, "AWS_ENDPOINT_URL")? {
            ensure_s3(config).endpoint.get_or_insert(endpoint);
        }
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(S3Config::default)
}

fn ensure_server(config: &mut RuntimeConfig) -> &mut ServerConfig {
    config.server.get_or_insert_with(ServerConfig::default)
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

/// Get a raw environment variable without the ECGINGEST_ prefix
fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn normalize_prefix(prefix: String) -> Option<String> {
    if prefix.is_empty() {
        None
    } else if prefix.ends_with('/') {
        Some(prefix)
    } else {
        Some(format!("{}/", prefix))
    }
}
