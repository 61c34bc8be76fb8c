use rusqlite::Connection;

use super::error::StorageError;

pub const USAGE_QUOTAS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS usage_quotas (
    subject_id TEXT PRIMARY KEY,
    count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
    last_action_date TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub fn init_database(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(USAGE_QUOTAS_TABLE_SCHEMA)?;
    Ok(())
}
