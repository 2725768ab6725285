use redb::ReadableTable;

use super::db::{Database, StoreError};
use super::models::{FilePatch, FileRecord};
use super::tables::*;

/// Outcome of a metadata update attempt.
#[derive(Debug)]
pub enum FileUpdate {
    Updated(FileRecord),
    /// The requested display name is already taken by another active file of
    /// the same owner. Nothing was written.
    NameTaken,
    /// No active row with that id.
    Missing,
}

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Insert a file row and its uniqueness/listing index entries.
    ///
    /// Returns `Ok(false)` without writing anything when the owner already has
    /// an active file with that name. The check and the insert happen in the
    /// same write transaction, so concurrent creates cannot both succeed.
    pub fn create_file(&self, file: &FileRecord) -> Result<bool, StoreError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(!file.owner_id.is_empty(), "owner id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let names = write_txn.open_table(OWNER_NAMES)?;
            if names
                .get((file.owner_id.as_str(), file.name.as_str()))?
                .is_some()
            {
                // Dropping the transaction discards it.
                return Ok(false);
            }
        }
        {
            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;

            let mut names = write_txn.open_table(OWNER_NAMES)?;
            names.insert(
                (file.owner_id.as_str(), file.name.as_str()),
                file.id.as_str(),
            )?;

            // Maintain owner listing index
            let mut owner_files = write_txn.open_table(OWNER_FILES)?;
            let mut file_ids: Vec<String> = owner_files
                .get(file.owner_id.as_str())?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();
            if !file_ids.contains(&file.id) {
                file_ids.push(file.id.clone());
                let index_data = rmp_serde::to_vec_named(&file_ids)?;
                owner_files.insert(file.owner_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Get a non-deleted file by its UUID
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok((!file.deleted).then_some(file))
            }
            None => Ok(None),
        }
    }

    /// Resolve an active file through the (owner, name) uniqueness index.
    pub fn find_by_owner_and_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Option<FileRecord>, StoreError> {
        let read_txn = self.begin_read()?;
        let names = read_txn.open_table(OWNER_NAMES)?;

        let id = match names.get((owner_id, name))? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let files_table = read_txn.open_table(FILES)?;
        match files_table.get(id.as_str())? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok((!file.deleted).then_some(file))
            }
            None => Ok(None),
        }
    }

    /// List active files, all of them or one owner's (via the owner index).
    pub fn list_files(&self, owner_id: Option<&str>) -> Result<Vec<FileRecord>, StoreError> {
        let read_txn = self.begin_read()?;
        let files_table = read_txn.open_table(FILES)?;
        let mut files = Vec::new();

        match owner_id {
            Some(owner) => {
                let index = read_txn.open_table(OWNER_FILES)?;
                let file_ids: Vec<String> = match index.get(owner)? {
                    Some(data) => rmp_serde::from_slice(data.value())?,
                    None => return Ok(files),
                };
                for file_id in file_ids {
                    if let Some(data) = files_table.get(file_id.as_str())? {
                        let file: FileRecord = rmp_serde::from_slice(data.value())?;
                        if !file.deleted {
                            files.push(file);
                        }
                    }
                }
            }
            None => {
                for result in files_table.iter()? {
                    let (_, value) = result?;
                    let file: FileRecord = rmp_serde::from_slice(value.value())?;
                    if !file.deleted {
                        files.push(file);
                    }
                }
            }
        }

        Ok(files)
    }

    /// Apply a metadata patch to an active file, maintaining the name index.
    pub fn update_file(&self, id: &str, patch: &FilePatch) -> Result<FileUpdate, StoreError> {
        let write_txn = self.begin_write()?;

        let existing: Option<FileRecord> = {
            let table = write_txn.open_table(FILES)?;
            let existing = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            existing
        };

        let outcome = match existing {
            Some(mut file) if !file.deleted => {
                if let Some(new_name) = &patch.name {
                    if *new_name != file.name {
                        {
                            let names = write_txn.open_table(OWNER_NAMES)?;
                            if names
                                .get((file.owner_id.as_str(), new_name.as_str()))?
                                .is_some()
                            {
                                return Ok(FileUpdate::NameTaken);
                            }
                        }
                        {
                            let mut names = write_txn.open_table(OWNER_NAMES)?;
                            names.remove((file.owner_id.as_str(), file.name.as_str()))?;
                            names.insert((file.owner_id.as_str(), new_name.as_str()), id)?;
                        }
                        file.name = new_name.clone();
                    }
                }

                if let Some(folder) = patch.folder_id.as_option() {
                    file.folder_id = folder.cloned();
                }

                file.updated_at = chrono::Utc::now();

                let data = rmp_serde::to_vec_named(&file)?;
                let mut table = write_txn.open_table(FILES)?;
                table.insert(id, data.as_slice())?;
                FileUpdate::Updated(file)
            }
            _ => FileUpdate::Missing,
        };

        write_txn.commit()?;
        Ok(outcome)
    }

    /// Soft-delete a file: mark the row, drop its uniqueness and listing index
    /// entries, and return the storage key for the caller's physical cleanup.
    pub fn soft_delete_file(&self, id: &str) -> Result<Option<String>, StoreError> {
        let write_txn = self.begin_write()?;

        let existing: Option<FileRecord> = {
            let table = write_txn.open_table(FILES)?;
            let existing = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            existing
        };

        let key = match existing {
            Some(mut file) if !file.deleted => {
                file.deleted = true;
                file.updated_at = chrono::Utc::now();
                {
                    let data = rmp_serde::to_vec_named(&file)?;
                    let mut table = write_txn.open_table(FILES)?;
                    table.insert(id, data.as_slice())?;
                }
                remove_name_index(&write_txn, &file.owner_id, &file.name)?;
                remove_owner_index(&write_txn, &file.owner_id, id)?;
                Some(file.storage_key)
            }
            _ => None,
        };

        write_txn.commit()?;
        Ok(key)
    }
}

/// Drop the (owner, name) uniqueness entry inside an open write transaction.
pub(crate) fn remove_name_index(
    write_txn: &redb::WriteTransaction,
    owner_id: &str,
    name: &str,
) -> Result<(), StoreError> {
    let mut names = write_txn.open_table(OWNER_NAMES)?;
    names.remove((owner_id, name))?;
    Ok(())
}

/// Remove a file id from the owner listing index inside an open write transaction.
pub(crate) fn remove_owner_index(
    write_txn: &redb::WriteTransaction,
    owner_id: &str,
    file_id: &str,
) -> Result<(), StoreError> {
    let file_ids: Option<Vec<String>> = {
        let table = write_txn.open_table(OWNER_FILES)?;
        let ids = match table.get(owner_id)? {
            Some(data) => Some(rmp_serde::from_slice(data.value())?),
            None => None,
        };
        ids
    };

    if let Some(mut ids) = file_ids {
        ids.retain(|fid| fid != file_id);
        let mut table = write_txn.open_table(OWNER_FILES)?;
        if ids.is_empty() {
            table.remove(owner_id)?;
        } else {
            let data = rmp_serde::to_vec_named(&ids)?;
            table.insert(owner_id, data.as_slice())?;
        }
    }
    Ok(())
}
