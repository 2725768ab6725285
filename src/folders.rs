//! Folder collaborator seam.
//!
//! Folder hierarchy CRUD lives outside this crate; the orchestrator only needs
//! an existence check before attaching a file to a folder, plus the shared
//! cache eviction it performs itself when a folder's file listing changes.

use async_trait::async_trait;
use dashmap::DashMap;

/// Existence check supplied by the external folder service.
#[async_trait]
pub trait FolderDirectory: Send + Sync {
    /// Whether the folder exists and can receive files.
    async fn exists(&self, folder_id: &str) -> bool;
}

/// In-memory directory for deployments that manage folders elsewhere, and for
/// tests.
#[derive(Default)]
pub struct InMemoryFolderDirectory {
    folders: DashMap<String, ()>,
}

impl InMemoryFolderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, folder_id: impl Into<String>) {
        self.folders.insert(folder_id.into(), ());
    }

    pub fn remove(&self, folder_id: &str) {
        self.folders.remove(folder_id);
    }
}

#[async_trait]
impl FolderDirectory for InMemoryFolderDirectory {
    async fn exists(&self, folder_id: &str) -> bool {
        self.folders.contains_key(folder_id)
    }
}
