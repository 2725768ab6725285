//! file-depot - File lifecycle and streaming orchestration for a multi-tenant
//! storage service
//!
//! This crate owns the full lifecycle of uploaded files:
//! - Swappable object storage backends (local filesystem, GCS)
//! - redb embedded database for metadata (ACID, MVCC, crash-safe)
//! - Read-through TTL cache decorating the metadata store
//! - Byte-range streaming with partial-content framing
//! - Transparent gzip compression in the upload pipeline
//! - Community flag moderation with automatic threshold takedown

pub mod cache;
pub mod compress;
pub mod config;
pub mod error;
pub mod folders;
pub mod object_store;
pub mod orchestrator;
pub mod store;
pub mod stream;

use std::sync::Arc;

use config::{Config, StorageBackend};
use tracing::info;

pub use error::{Error, Result};
pub use orchestrator::{FileDownload, FileOrchestrator, NewFileRequest};

/// Wire up a [`FileOrchestrator`] from configuration: open the database,
/// build the cache and the configured object storage backend, and hand the
/// folder collaborator through.
pub async fn bootstrap(
    config: &Config,
    folders: Arc<dyn folders::FolderDirectory>,
) -> anyhow::Result<FileOrchestrator> {
    let db = store::Database::open(&config.data_dir)?;
    info!("Database opened at: {}", config.data_dir);

    let objects: Arc<dyn object_store::ObjectStore> = match config.storage.backend {
        StorageBackend::Local => {
            let backend = object_store::LocalStore::new(&config.storage.local_storage_path)?;
            info!(
                "Using local storage backend at: {}",
                config.storage.local_storage_path
            );
            Arc::new(backend)
        }
        StorageBackend::Gcs => {
            let bucket = config
                .storage
                .gcs_bucket
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("GCS_BUCKET is required"))?;
            let backend =
                object_store::GcsStore::new(bucket, config.storage.gcs_credentials_file.as_deref())
                    .await?;
            info!("Using GCS storage backend, bucket: {}", bucket);
            Arc::new(backend)
        }
    };

    let cache = Arc::new(cache::Cache::new(config.cache_ttl()));
    let store = store::CachedStore::new(db, cache);

    Ok(FileOrchestrator::new(
        store,
        objects,
        folders,
        config.max_flag_count,
    ))
}
