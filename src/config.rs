use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub storage: StorageConfig,
    /// Active-flag count at which a file is automatically taken down.
    pub max_flag_count: u32,
    /// Lifetime of cached metadata entries, in seconds.
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            gcs_bucket: None,
            gcs_credentials_file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            storage: StorageConfig::default(),
            max_flag_count: 5,
            cache_ttl_seconds: 12 * 60 * 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => StorageBackend::Gcs,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let gcs_bucket = std::env::var("GCS_BUCKET").ok();
        let gcs_credentials_file = std::env::var("GCS_CREDENTIALS_FILE").ok();

        let max_flag_count = std::env::var("MAX_FLAG_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let cache_ttl_seconds = std::env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(12 * 60 * 60); // 12 hours

        let config = Config {
            data_dir,
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                gcs_bucket,
                gcs_credentials_file,
            },
            max_flag_count,
            cache_ttl_seconds,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_flag_count == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_FLAG_COUNT must be at least 1".to_string(),
            ));
        }

        if matches!(self.storage.backend, StorageBackend::Gcs) && self.storage.gcs_bucket.is_none()
        {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}
