use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::error::StorageError;
use super::schema::init_database;
use super::store::{QuotaRecord, QuotaStore};
use super::QUOTA_DB_FILENAME;

const RETURNING_COLUMNS: &str = "RETURNING subject_id, count, last_action_date, updated_at";

/// SQLite-backed [`QuotaStore`].
///
/// All statements run on one connection behind a mutex, so each method is a
/// single serialized statement. The limit check for [`QuotaStore::try_claim`]
/// lives inside the upsert's `WHERE` clause.
pub struct SqliteQuotaStore {
    db_path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteQuotaStore {
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(QUOTA_DB_FILENAME);
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        init_database(&conn)?;

        debug!(path = %db_path.display(), "opened quota database");

        Ok(Self {
            db_path: Some(db_path),
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        init_database(&conn)?;

        Ok(Self {
            db_path: None,
            conn: Mutex::new(conn),
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(f(&conn)?)
    }
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn get(&self, subject_id: &str) -> Result<Option<QuotaRecord>, StorageError> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT subject_id, count, last_action_date, updated_at
                FROM usage_quotas
                WHERE subject_id = ?1
                "#,
                params![subject_id],
                map_record,
            )
            .optional()
        })
    }

    async fn upsert_fresh(
        &self,
        subject_id: &str,
        today: NaiveDate,
    ) -> Result<QuotaRecord, StorageError> {
        let sql = format!(
            r#"
            INSERT INTO usage_quotas (subject_id, count, last_action_date, updated_at)
            VALUES (?1, 1, ?2, ?3)
            ON CONFLICT(subject_id) DO UPDATE SET
                count = 1,
                last_action_date = excluded.last_action_date,
                updated_at = excluded.updated_at
            {RETURNING_COLUMNS}
            "#
        );

        self.with_conn(|conn| {
            conn.query_row(&sql, params![subject_id, today, Utc::now()], map_record)
        })
    }

    async fn increment_or_reset(
        &self,
        subject_id: &str,
        today: NaiveDate,
    ) -> Result<QuotaRecord, StorageError> {
        let sql = format!(
            r#"
            INSERT INTO usage_quotas (subject_id, count, last_action_date, updated_at)
            VALUES (?1, 1, ?2, ?3)
            ON CONFLICT(subject_id) DO UPDATE SET
                count = CASE
                    WHEN usage_quotas.last_action_date = excluded.last_action_date
                        THEN usage_quotas.count + 1
                    ELSE 1
                END,
                last_action_date = excluded.last_action_date,
                updated_at = excluded.updated_at
            {RETURNING_COLUMNS}
            "#
        );

        self.with_conn(|conn| {
            conn.query_row(&sql, params![subject_id, today, Utc::now()], map_record)
        })
    }

    async fn try_claim(
        &self,
        subject_id: &str,
        today: NaiveDate,
        limit: u64,
    ) -> Result<Option<QuotaRecord>, StorageError> {
        if limit == 0 {
            return Ok(None);
        }

        // A conflicting row that fails the WHERE clause is left untouched and
        // RETURNING yields nothing.
        let sql = format!(
            r#"
            INSERT INTO usage_quotas (subject_id, count, last_action_date, updated_at)
            VALUES (?1, 1, ?2, ?3)
            ON CONFLICT(subject_id) DO UPDATE SET
                count = CASE
                    WHEN usage_quotas.last_action_date = excluded.last_action_date
                        THEN usage_quotas.count + 1
                    ELSE 1
                END,
                last_action_date = excluded.last_action_date,
                updated_at = excluded.updated_at
            WHERE usage_quotas.last_action_date <> excluded.last_action_date
                OR usage_quotas.count < ?4
            {RETURNING_COLUMNS}
            "#
        );

        self.with_conn(|conn| {
            conn.query_row(
                &sql,
                params![subject_id, today, Utc::now(), to_sql_count(limit)],
                map_record,
            )
            .optional()
        })
    }

    async fn release(
        &self,
        subject_id: &str,
        today: NaiveDate,
    ) -> Result<Option<QuotaRecord>, StorageError> {
        let sql = format!(
            r#"
            UPDATE usage_quotas
            SET count = count - 1,
                updated_at = ?3
            WHERE subject_id = ?1
                AND last_action_date = ?2
                AND count > 0
            {RETURNING_COLUMNS}
            "#
        );

        self.with_conn(|conn| {
            conn.query_row(&sql, params![subject_id, today, Utc::now()], map_record)
                .optional()
        })
    }
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<QuotaRecord> {
    let count: i64 = row.get(1)?;
    Ok(QuotaRecord {
        subject_id: row.get(0)?,
        count: u64::try_from(count).unwrap_or(0),
        last_action_date: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
