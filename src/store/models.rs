use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three-state patch value for partial updates that survives serialization round-trips.
/// Unlike `Option<Option<T>>`, each variant has a distinct wire representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Patch<T> {
    /// Field was not included in the request (no change).
    #[default]
    Absent,
    /// Field was explicitly set to null (clear it).
    Null,
    /// Field was set to a new value.
    Value(T),
}

impl<T> From<Option<Option<T>>> for Patch<T> {
    fn from(v: Option<Option<T>>) -> Self {
        match v {
            None => Patch::Absent,
            Some(None) => Patch::Null,
            Some(Some(v)) => Patch::Value(v),
        }
    }
}

impl<T> Patch<T> {
    /// Convert to the `Option<Option<&T>>` form that storage operations expect.
    pub fn as_option(&self) -> Option<Option<&T>> {
        match self {
            Patch::Absent => None,
            Patch::Null => Some(None),
            Patch::Value(v) => Some(Some(v)),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }
}

/// Content-affecting operations recorded in a file's history trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileAction {
    Upload,
    Download,
    Stream,
    Update,
    Delete,
}

/// A file row stored in redb.
///
/// A non-deleted file's (owner_id, name) pair is unique; `storage_key` locates the
/// blob in the object storage backend and carries a `.gz` suffix when the content
/// was compressed on upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    pub name: String,
    pub storage_key: String,
    pub flag_count: u32,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A moderation flag raised by one user against one file.
/// At most one active (non-deleted) flag exists per (file, flagger) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRecord {
    pub id: String,
    pub file_id: String,
    pub flagger_id: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Append-only provenance record. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub file_id: String,
    pub action: FileAction,
    pub created_at: DateTime<Utc>,
}

/// Partial update for a file's mutable metadata fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilePatch {
    /// New display name (must stay unique per owner).
    #[serde(default)]
    pub name: Option<String>,
    /// Move to another folder, clear the folder linkage, or leave as-is.
    #[serde(default)]
    pub folder_id: Patch<String>,
}

impl FilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.folder_id.is_absent()
    }
}
