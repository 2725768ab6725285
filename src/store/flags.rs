use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, StoreError};
use super::files::{remove_name_index, remove_owner_index};
use super::models::{FileRecord, FlagRecord};
use super::tables::*;

/// Result of a flag transition. `file` is the row as committed, so callers can
/// refresh or evict their cache entry without a second read.
#[derive(Debug)]
pub struct FlagOutcome {
    pub flag: FlagRecord,
    pub file: FileRecord,
    /// False when the (file, flagger) pair was already flagged and the
    /// existing flag was returned unchanged.
    pub created: bool,
}

/// Result of an unflag transition.
#[derive(Debug)]
pub enum UnflagOutcome {
    Removed(FileRecord),
    /// No active flag by this user on this file.
    NotFlagged,
}

impl Database {
    // ========================================================================
    // Moderation transitions
    // ========================================================================
    //
    // The flag row, the active-flag index and the file's counter are mutated
    // inside one write transaction, so a reader can never observe the counter
    // and the set of active flags disagreeing.

    /// FLAG transition for a (file, flagger) pair.
    ///
    /// Idempotent: an existing active flag is returned unchanged. Otherwise a
    /// flag row is created and the file's counter incremented; when the
    /// post-increment counter equals `threshold` the file is soft-deleted in
    /// the same transaction, exactly once per crossing.
    ///
    /// Returns `Ok(None)` when no active file row exists.
    pub fn flag_file(
        &self,
        file_id: &str,
        flagger_id: &str,
        threshold: u32,
    ) -> Result<Option<FlagOutcome>, StoreError> {
        let write_txn = self.begin_write()?;

        let file: Option<FileRecord> = {
            let table = write_txn.open_table(FILES)?;
            let file = match table.get(file_id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            file
        };
        let mut file = match file {
            Some(f) if !f.deleted => f,
            _ => return Ok(None),
        };

        let existing_flag_id: Option<String> = {
            let active = write_txn.open_table(ACTIVE_FLAGS)?;
            let id = active
                .get((file_id, flagger_id))?
                .map(|v| v.value().to_string());
            id
        };

        let outcome = match existing_flag_id {
            Some(flag_id) => {
                let flag: FlagRecord = {
                    let flags = write_txn.open_table(FLAGS)?;
                    let flag = match flags.get(flag_id.as_str())? {
                        Some(data) => rmp_serde::from_slice(data.value())?,
                        // Dangling index entry; treat the pair as unflagged
                        // rather than failing the transition.
                        None => return Ok(None),
                    };
                    flag
                };
                FlagOutcome {
                    flag,
                    file,
                    created: false,
                }
            }
            None => {
                let flag = FlagRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    file_id: file_id.to_string(),
                    flagger_id: flagger_id.to_string(),
                    deleted: false,
                    created_at: Utc::now(),
                };
                {
                    let mut flags = write_txn.open_table(FLAGS)?;
                    let data = rmp_serde::to_vec_named(&flag)?;
                    flags.insert(flag.id.as_str(), data.as_slice())?;

                    let mut active = write_txn.open_table(ACTIVE_FLAGS)?;
                    active.insert((file_id, flagger_id), flag.id.as_str())?;
                }

                file.flag_count += 1;
                file.updated_at = Utc::now();
                if file.flag_count == threshold {
                    file.deleted = true;
                    remove_name_index(&write_txn, &file.owner_id, &file.name)?;
                    remove_owner_index(&write_txn, &file.owner_id, file_id)?;
                }
                {
                    let data = rmp_serde::to_vec_named(&file)?;
                    let mut table = write_txn.open_table(FILES)?;
                    table.insert(file_id, data.as_slice())?;
                }

                FlagOutcome {
                    flag,
                    file,
                    created: true,
                }
            }
        };

        write_txn.commit()?;
        Ok(Some(outcome))
    }

    /// UNFLAG transition: soft-delete the active flag and decrement the file's
    /// counter together. The counter never goes below zero.
    pub fn unflag_file(
        &self,
        file_id: &str,
        flagger_id: &str,
    ) -> Result<UnflagOutcome, StoreError> {
        let write_txn = self.begin_write()?;

        let flag_id: Option<String> = {
            let active = write_txn.open_table(ACTIVE_FLAGS)?;
            let id = active
                .get((file_id, flagger_id))?
                .map(|v| v.value().to_string());
            id
        };
        let flag_id = match flag_id {
            Some(id) => id,
            None => return Ok(UnflagOutcome::NotFlagged),
        };

        let mut flag: FlagRecord = {
            let flags = write_txn.open_table(FLAGS)?;
            let flag = match flags.get(flag_id.as_str())? {
                Some(data) => rmp_serde::from_slice(data.value())?,
                None => return Ok(UnflagOutcome::NotFlagged),
            };
            flag
        };

        let file: Option<FileRecord> = {
            let table = write_txn.open_table(FILES)?;
            let file = match table.get(file_id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            file
        };
        let mut file = match file {
            Some(f) => f,
            None => return Ok(UnflagOutcome::NotFlagged),
        };

        flag.deleted = true;
        {
            let data = rmp_serde::to_vec_named(&flag)?;
            let mut flags = write_txn.open_table(FLAGS)?;
            flags.insert(flag_id.as_str(), data.as_slice())?;

            let mut active = write_txn.open_table(ACTIVE_FLAGS)?;
            active.remove((file_id, flagger_id))?;
        }

        file.flag_count = file.flag_count.saturating_sub(1);
        file.updated_at = Utc::now();
        {
            let data = rmp_serde::to_vec_named(&file)?;
            let mut table = write_txn.open_table(FILES)?;
            table.insert(file_id, data.as_slice())?;
        }

        write_txn.commit()?;
        Ok(UnflagOutcome::Removed(file))
    }

    /// Number of active flags on a file, counted from the index.
    pub fn active_flag_count(&self, file_id: &str) -> Result<u32, StoreError> {
        let read_txn = self.begin_read()?;
        let active = read_txn.open_table(ACTIVE_FLAGS)?;
        let mut count = 0;
        for entry in active.iter()? {
            let (key, _) = entry?;
            if key.value().0 == file_id {
                count += 1;
            }
        }
        Ok(count)
    }
}
