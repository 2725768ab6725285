use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, StoreError};
use super::models::{FileAction, HistoryRecord};
use super::tables::*;

impl Database {
    // ========================================================================
    // History trail
    // ========================================================================

    /// Append a history record for a file. Records are never mutated or
    /// removed; a trail may outlive its file since deletion is soft.
    pub fn append_history(
        &self,
        file_id: &str,
        action: FileAction,
    ) -> Result<HistoryRecord, StoreError> {
        let record = HistoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            action,
            created_at: Utc::now(),
        };

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILE_HISTORY)?;
            let mut trail: Vec<HistoryRecord> = table
                .get(file_id)?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();
            trail.push(record.clone());
            let data = rmp_serde::to_vec_named(&trail)?;
            table.insert(file_id, data.as_slice())?;
        }
        write_txn.commit()?;

        Ok(record)
    }

    /// Full history trail for a file, oldest first. Empty when none recorded.
    pub fn get_history(&self, file_id: &str) -> Result<Vec<HistoryRecord>, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILE_HISTORY)?;

        match table.get(file_id)? {
            Some(data) => Ok(rmp_serde::from_slice(data.value())?),
            None => Ok(Vec::new()),
        }
    }
}
