use redb::TableDefinition;

/// File rows: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Active-name uniqueness index: (owner_id, name) -> file uuid.
/// Entries exist only for non-deleted files.
pub const OWNER_NAMES: TableDefinition<(&str, &str), &str> = TableDefinition::new("owner_names");

/// Owner listing index: owner_id -> msgpack Vec of file uuids (non-deleted only)
pub const OWNER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_files");

/// Flag rows: uuid -> FlagRecord (msgpack)
pub const FLAGS: TableDefinition<&str, &[u8]> = TableDefinition::new("flags");

/// Active flag index: (file_id, flagger_id) -> flag uuid.
/// Entries exist only for non-deleted flags.
pub const ACTIVE_FLAGS: TableDefinition<(&str, &str), &str> = TableDefinition::new("active_flags");

/// History trail: file_id -> msgpack Vec<HistoryRecord>, append-only
pub const FILE_HISTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("file_history");
