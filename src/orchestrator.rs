//! File orchestrator: owns the create/read/update/delete/flag/stream
//! workflows and coordinates the cache decorator, the metadata store and the
//! object storage backend.
//!
//! Construction happens once at process start; request-scoped calls borrow
//! the instance. Nothing here retries backend failures internally -- a retry
//! would risk duplicate history records, so transient errors surface to the
//! caller as [`Error::Backend`].

use std::sync::Arc;

use chrono::Utc;

use crate::compress;
use crate::error::{Error, Result};
use crate::folders::FolderDirectory;
use crate::object_store::{BodyReader, ObjectStore};
use crate::store::models::{FileAction, FilePatch, FileRecord, FlagRecord, HistoryRecord};
use crate::store::{CachedStore, FileUpdate, UnflagOutcome};
use crate::stream::{self, FileStream};

/// Storage-key extensions eligible for moderation flags.
const FLAGGABLE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "mp4"];

/// Input for a file upload.
#[derive(Debug, Clone)]
pub struct NewFileRequest {
    /// Display name, unique per owner among active files.
    pub name: String,
    /// Original upload filename; carries the extension the storage key and
    /// MIME inference are derived from.
    pub file_name: String,
    pub folder_id: Option<String>,
    /// Gzip the content transparently on its way to the backend.
    pub compress: bool,
}

/// A full-object download ready to be served as an attachment.
pub struct FileDownload {
    /// Attachment filename: display name plus the storage key's extension.
    pub file_name: String,
    pub mime: String,
    pub size: u64,
    pub body: BodyReader,
}

pub struct FileOrchestrator {
    store: CachedStore,
    objects: Arc<dyn ObjectStore>,
    folders: Arc<dyn FolderDirectory>,
    flag_threshold: u32,
}

impl FileOrchestrator {
    pub fn new(
        store: CachedStore,
        objects: Arc<dyn ObjectStore>,
        folders: Arc<dyn FolderDirectory>,
        flag_threshold: u32,
    ) -> Self {
        Self {
            store,
            objects,
            folders,
            flag_threshold,
        }
    }

    /// Upload a file: stream the content to the backend (optionally through
    /// the gzip filter), then persist and cache the metadata row, then record
    /// an UPLOAD history entry.
    ///
    /// A backend failure aborts before any metadata exists; a duplicate name
    /// is a conflict detected before the backend is touched.
    pub async fn create_file(
        &self,
        owner_id: &str,
        request: NewFileRequest,
        body: BodyReader,
    ) -> Result<FileRecord> {
        if self
            .store
            .find_by_owner_and_name(owner_id, &request.name)?
            .is_some()
        {
            return Err(Error::conflict("You already own a file with that name."));
        }

        if let Some(folder_id) = &request.folder_id {
            if !self.folders.exists(folder_id).await {
                return Err(Error::not_found("Folder not found."));
            }
            // The folder's file listing is about to change.
            self.store.invalidate(folder_id);
        }

        let mut storage_key = format!("{}-{}", Utc::now().timestamp_millis(), request.file_name);
        if request.compress {
            storage_key.push_str(compress::GZIP_SUFFIX);
        }

        let body = compress::apply(body, request.compress);
        self.objects.put(&storage_key, body).await?;

        let now = Utc::now();
        let file = FileRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            folder_id: request.folder_id.clone(),
            name: request.name.clone(),
            storage_key: storage_key.clone(),
            flag_count: 0,
            deleted: false,
            created_at: now,
            updated_at: now,
        };

        if !self.store.create_file(&file)? {
            // Lost a create race after the blob was written; clean it up
            // best-effort and report the conflict.
            if let Err(e) = self.objects.delete(&storage_key).await {
                tracing::warn!(key = %storage_key, error = %e, "Failed to clean up orphaned blob");
            }
            return Err(Error::conflict("You already own a file with that name."));
        }

        self.note_history(&file.id, FileAction::Upload);
        tracing::debug!(file_id = %file.id, owner_id, "Created file");

        Ok(file)
    }

    /// Cache-aside read of a single active file.
    pub async fn get_file(&self, id: &str) -> Result<FileRecord> {
        self.store
            .get_file(id)?
            .ok_or_else(|| Error::not_found("File not found."))
    }

    /// List active files, all of them or one owner's.
    pub async fn list_files(&self, owner_id: Option<&str>) -> Result<Vec<FileRecord>> {
        Ok(self.store.list_files(owner_id)?)
    }

    /// Apply a metadata patch and/or replace the content bytes.
    ///
    /// New content is re-uploaded to the existing storage key before the
    /// metadata commits; a name change is written through to the cache, a
    /// folder move invalidates instead.
    pub async fn update_file(
        &self,
        id: &str,
        patch: FilePatch,
        content: Option<BodyReader>,
    ) -> Result<FileRecord> {
        if patch.is_empty() && content.is_none() {
            return Err(Error::invalid(
                "At least one of name, folder_id or content must be provided.",
            ));
        }

        let existing = self.get_file(id).await?;

        if let Some(Some(folder_id)) = patch.folder_id.as_option() {
            if !self.folders.exists(folder_id).await {
                return Err(Error::not_found("Folder not found."));
            }
        }

        let replaced_content = match content {
            Some(body) => {
                let body = compress::apply(body, compress::is_compressed(&existing.storage_key));
                self.objects.put(&existing.storage_key, body).await?;
                true
            }
            None => false,
        };

        let file = match self.store.update_file(id, &patch)? {
            FileUpdate::Updated(file) => file,
            FileUpdate::NameTaken => {
                return Err(Error::conflict("You already own a file with that name."));
            }
            FileUpdate::Missing => return Err(Error::not_found("File not found.")),
        };

        // Folder listings changed on both ends of a move.
        if !patch.folder_id.is_absent() {
            if let Some(old_folder) = &existing.folder_id {
                self.store.invalidate(old_folder);
            }
            if let Some(new_folder) = &file.folder_id {
                self.store.invalidate(new_folder);
            }
        }

        if replaced_content {
            self.note_history(id, FileAction::Update);
        }
        tracing::debug!(file_id = %id, "Updated file");

        Ok(file)
    }

    /// Soft-delete a file and return its storage key.
    ///
    /// The physical blob deletion is the caller's next, strictly-sequenced
    /// step (see [`Self::delete_blob`]); a crash in between leaves an orphan
    /// blob but never a metadata row pointing at a missing one.
    pub async fn delete_file(&self, id: &str) -> Result<String> {
        let storage_key = self
            .store
            .soft_delete_file(id)?
            .ok_or_else(|| Error::not_found("File not found."))?;

        tracing::debug!(file_id = %id, "Deleted file");
        Ok(storage_key)
    }

    /// Best-effort physical blob removal, sequenced after the soft-delete
    /// commit. Failures are logged; the blob becomes an acceptable orphan.
    pub async fn delete_blob(&self, storage_key: &str) {
        if let Err(e) = self.objects.delete(storage_key).await {
            tracing::warn!(key = %storage_key, error = %e, "Failed to delete blob from object storage");
        }
    }

    /// FLAG transition for (file, flagger). Idempotent for an already-flagged
    /// pair; crossing the configured threshold takes the file down in the
    /// same transition, exactly once.
    pub async fn flag_file(&self, file_id: &str, flagger_id: &str) -> Result<FlagRecord> {
        let file = self.get_file(file_id).await?;

        let flaggable = stream::extension(&file.storage_key)
            .is_some_and(|ext| FLAGGABLE_EXTENSIONS.contains(&ext));
        if !flaggable {
            return Err(Error::invalid("Only photos and videos can be flagged."));
        }

        let outcome = self
            .store
            .flag_file(file_id, flagger_id, self.flag_threshold)?
            .ok_or_else(|| Error::not_found("File not found."))?;

        if outcome.created && outcome.file.deleted {
            tracing::info!(
                file_id,
                flag_count = outcome.file.flag_count,
                "Flag threshold reached; file taken down"
            );
        }

        Ok(outcome.flag)
    }

    /// UNFLAG transition; requires an active flag by this user.
    pub async fn unflag_file(&self, file_id: &str, flagger_id: &str) -> Result<()> {
        match self.store.unflag_file(file_id, flagger_id)? {
            UnflagOutcome::Removed(_) => {
                tracing::debug!(file_id, flagger_id, "Removed flag");
                Ok(())
            }
            UnflagOutcome::NotFlagged => Err(Error::invalid(
                "This file wasn't flagged by this user.",
            )),
        }
    }

    /// Append a history record for a file.
    pub async fn record_history(&self, file_id: &str, action: FileAction) -> Result<HistoryRecord> {
        Ok(self.store.append_history(file_id, action)?)
    }

    /// Full history trail for a file, oldest first.
    pub async fn get_history(&self, file_id: &str) -> Result<Vec<HistoryRecord>> {
        Ok(self.store.get_history(file_id)?)
    }

    /// Open a bounded byte-range stream for an audio/video file.
    ///
    /// Exactly one chunk-sized window is requested from the backend, never
    /// the whole object. The STREAM history entry is best-effort.
    pub async fn open_stream(&self, file_id: &str, range: Option<&str>) -> Result<FileStream> {
        let file = self.get_file(file_id).await?;
        let mime = stream::streamable_mime(&file.storage_key)?;
        let start = stream::parse_range_start(range)?;

        let object = self
            .objects
            .get(&file.storage_key, Some(stream::requested_window(start)))
            .await?;
        let window = stream::clamp_window(start, object.total_size)?;

        self.note_history(file_id, FileAction::Stream);

        Ok(FileStream {
            mime,
            total_size: object.total_size,
            window,
            body: object.reader,
        })
    }

    /// Open a full-object download. The DOWNLOAD history entry is
    /// best-effort.
    pub async fn download(&self, file_id: &str) -> Result<FileDownload> {
        let file = self.get_file(file_id).await?;

        let object = self.objects.get(&file.storage_key, None).await?;

        let file_name = match stream::extension(&file.storage_key) {
            Some(ext) => format!("{}.{ext}", file.name),
            None => file.name.clone(),
        };
        let mime = stream::resolve_mime(&file.storage_key)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        self.note_history(file_id, FileAction::Download);

        Ok(FileDownload {
            file_name,
            mime,
            size: object.total_size,
            body: object.reader,
        })
    }

    /// History recording as a side effect: logged and swallowed on failure,
    /// never failing the primary operation.
    fn note_history(&self, file_id: &str, action: FileAction) {
        if let Err(e) = self.store.append_history(file_id, action) {
            tracing::warn!(file_id, ?action, error = %e, "Failed to record file history");
        }
    }
}
