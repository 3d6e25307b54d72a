// ecgingest-config - Runtime configuration for the ingestion service
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from ECGINGEST_CONFIG env var
// 3. Config file contents from ECGINGEST_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.ecgingest.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

/// Six hours between scheduled registry refreshes.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 6 * 60 * 60;

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub request: RequestConfig,

    pub storage: StorageConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub readings: ReadingsConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

/// Request handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub max_payload_bytes: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Remote document store backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,

    /// TOML file holding `access_key_id` / `secret_access_key` for the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            fs: Some(FsConfig::default()),
            s3: None,
            credentials_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Optional path prefix for all stored documents (e.g., "staging/")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

/// Device registry source and refresh cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub refresh_interval_secs: u64,
    /// Collection whose document ids are user ids
    pub collection: String,
    /// Field inside each user document naming the owned device
    pub device_field: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            collection: "UserAuthList".to_string(),
            device_field: "deviceId".to_string(),
        }
    }
}

/// Where enriched readings are written in the document store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingsConfig {
    pub collection: String,
    pub sub_collection: String,
}

impl Default for ReadingsConfig {
    fn default() -> Self {
        Self {
            collection: "ecg_data".to_string(),
            sub_collection: "readings".to_string(),
        }
    }
}

/// Local append-only log for batches that could not be stored remotely
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub path: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            path: "local_storage_errors.json".to_string(),
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request: RequestConfig::default(),
            storage: StorageConfig::default(),
            registry: RegistryConfig::default(),
            readings: ReadingsConfig::default(),
            fallback: FallbackConfig::default(),
            server: Some(ServerConfig::default()),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a specific file path (for CLI usage).
    ///
    /// The result is not validated; callers validate after applying their
    /// own overrides.
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Load configuration with graceful fallback to defaults.
    /// Does not fail if config file is missing - uses defaults instead.
    /// Like [`RuntimeConfig::load_from_path`], the result is not validated.
    pub fn load_or_default() -> Result<Self> {
        sources::load_or_default()
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.request = other.request;
        self.storage = other.storage;
        self.registry = other.registry;
        self.readings = other.readings;
        self.fallback = other.fallback;

        if other.server.is_some() {
            self.server = other.server;
        }
    }

    /// Apply environment overrides from a custom source (e.g., a test map).
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration from inline TOML plus overrides supplied by an
    /// `EnvSource`, without touching the host environment or filesystem.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("fs".parse::<StorageBackend>().unwrap(), StorageBackend::Fs);
        assert_eq!("s3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(
            "filesystem".parse::<StorageBackend>().unwrap(),
            StorageBackend::Fs
        );
        assert!("r2".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.registry.refresh_interval_secs, 21_600);
        assert_eq!(config.registry.collection, "UserAuthList");
        assert_eq!(config.readings.collection, "ecg_data");
        assert_eq!(config.fallback.path, "local_storage_errors.json");

        let server = ServerConfig::default();
        assert_eq!(server.listen_addr, "0.0.0.0:5000");
        assert_eq!(server.log_format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_section_defaults() {
        let inline = r#"
            [storage]
            backend = "fs"

            [storage.fs]
            path = "/var/lib/ecg"

            [fallback]
            path = "/var/log/ecg-fallback.jsonl"
        "#;
        let config: RuntimeConfig = toml::from_str(inline).unwrap();
        assert_eq!(config.fallback.path, "/var/log/ecg-fallback.jsonl");
        assert_eq!(config.registry.device_field, "deviceId");
        assert!(config.server.is_none());
    }

    #[test]
    fn test_registry_section_fills_missing_fields() {
        let inline = r#"
            [storage]
            backend = "fs"

            [registry]
            refresh_interval_secs = 900

            [readings]
            sub_collection = "samples"
        "#;
        let config: RuntimeConfig = toml::from_str(inline).unwrap();
        assert_eq!(config.registry.refresh_interval_secs, 900);
        assert_eq!(config.registry.collection, "UserAuthList");
        assert_eq!(config.registry.device_field, "deviceId");
        assert_eq!(config.readings.collection, "ecg_data");
        assert_eq!(config.readings.sub_collection, "samples");
    }

    struct FixedEnv(std::collections::HashMap<&'static str, &'static str>);

    impl EnvSource for FixedEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }

        fn get_raw(&self, _key: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_load_with_env_layers_inline_then_env() {
        let inline = r#"
            [storage]
            backend = "fs"

            [storage.fs]
            path = "./readings"

            [registry]
            refresh_interval_secs = 900
            collection = "Users"
        "#;
        let env = FixedEnv(
            [
                ("REFRESH_INTERVAL_SECS", "120"),
                ("LISTEN_ADDR", "127.0.0.1:7000"),
            ]
            .into_iter()
            .collect(),
        );

        let config = RuntimeConfig::load_with_env(Some(inline), &env).unwrap();
        assert_eq!(config.registry.refresh_interval_secs, 120);
        assert_eq!(config.registry.collection, "Users");
        assert_eq!(config.server.unwrap().listen_addr, "127.0.0.1:7000");
    }

    #[test]
    fn test_load_with_env_rejects_invalid_result() {
        let env = FixedEnv([("REFRESH_INTERVAL_SECS", "0")].into_iter().collect());
        assert!(RuntimeConfig::load_with_env(None, &env).is_err());
    }
}
