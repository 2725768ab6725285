use std::sync::Arc;

use crate::cache::Cache;

use super::db::{Database, StoreError};
use super::files::FileUpdate;
use super::flags::{FlagOutcome, UnflagOutcome};
use super::models::{FileAction, FilePatch, FileRecord, HistoryRecord};

/// Cache decorator around the metadata store.
///
/// This is the single place enforcing the consistency discipline: reads are
/// cache-aside (populate on miss, nothing cached negatively), metadata writes
/// are write-through with the row the transaction committed, deletions and
/// folder moves evict. Every mutation settles the cache before returning, so
/// staleness is bounded to the in-flight window of a concurrent write.
pub struct CachedStore {
    db: Database,
    cache: Arc<Cache>,
}

impl CachedStore {
    pub fn new(db: Database, cache: Arc<Cache>) -> Self {
        Self { db, cache }
    }

    /// Cache-aside read. A missing row is reported as `None` and never cached,
    /// so a later create or visibility change is observed immediately.
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        if let Some(file) = self.cache.get::<FileRecord>(id) {
            return Ok(Some(file));
        }

        match self.db.get_file(id)? {
            Some(file) => {
                self.cache.put(id, &file);
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Uniqueness lookup, always against the store (a stale cache entry must
    /// not mask a concurrent create). A hit is cached as a plain snapshot.
    pub fn find_by_owner_and_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Option<FileRecord>, StoreError> {
        match self.db.find_by_owner_and_name(owner_id, name)? {
            Some(file) => {
                self.cache.put(&file.id, &file);
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Insert a row and cache it immediately on success.
    pub fn create_file(&self, file: &FileRecord) -> Result<bool, StoreError> {
        let created = self.db.create_file(file)?;
        if created {
            self.cache.put(&file.id, file);
        }
        Ok(created)
    }

    /// Collections are never cached.
    pub fn list_files(&self, owner_id: Option<&str>) -> Result<Vec<FileRecord>, StoreError> {
        self.db.list_files(owner_id)
    }

    /// Apply a patch. Plain field changes are written through with the
    /// committed row; a folder move evicts instead, so stale folder linkage
    /// is never served from cache.
    pub fn update_file(&self, id: &str, patch: &FilePatch) -> Result<FileUpdate, StoreError> {
        let outcome = self.db.update_file(id, patch)?;
        if let FileUpdate::Updated(file) = &outcome {
            if patch.folder_id.is_absent() {
                self.cache.put(id, file);
            } else {
                self.cache.evict(id);
            }
        }
        Ok(outcome)
    }

    /// Soft-delete and evict. The returned storage key is the caller's handle
    /// for the sequenced physical blob deletion.
    pub fn soft_delete_file(&self, id: &str) -> Result<Option<String>, StoreError> {
        let key = self.db.soft_delete_file(id)?;
        if key.is_some() {
            self.cache.evict(id);
        }
        Ok(key)
    }

    /// FLAG transition; evicts the entry when the threshold takedown fired,
    /// refreshes it otherwise.
    pub fn flag_file(
        &self,
        file_id: &str,
        flagger_id: &str,
        threshold: u32,
    ) -> Result<Option<FlagOutcome>, StoreError> {
        let outcome = self.db.flag_file(file_id, flagger_id, threshold)?;
        if let Some(outcome) = &outcome {
            if outcome.file.deleted {
                self.cache.evict(file_id);
            } else {
                self.cache.put(file_id, &outcome.file);
            }
        }
        Ok(outcome)
    }

    /// UNFLAG transition with the same cache settlement as flagging.
    pub fn unflag_file(
        &self,
        file_id: &str,
        flagger_id: &str,
    ) -> Result<UnflagOutcome, StoreError> {
        let outcome = self.db.unflag_file(file_id, flagger_id)?;
        if let UnflagOutcome::Removed(file) = &outcome {
            if file.deleted {
                self.cache.evict(file_id);
            } else {
                self.cache.put(file_id, file);
            }
        }
        Ok(outcome)
    }

    pub fn append_history(
        &self,
        file_id: &str,
        action: FileAction,
    ) -> Result<HistoryRecord, StoreError> {
        self.db.append_history(file_id, action)
    }

    pub fn get_history(&self, file_id: &str) -> Result<Vec<HistoryRecord>, StoreError> {
        self.db.get_history(file_id)
    }

    /// Evict an arbitrary entity snapshot, e.g. a folder whose file listing
    /// changed. Used for collaborators that share this cache.
    pub fn invalidate(&self, entity_id: &str) {
        self.cache.evict(entity_id);
    }
}
