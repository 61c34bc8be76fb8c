use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::error::StorageError;
use super::store::{QuotaRecord, QuotaStore};

/// Process-local [`QuotaStore`]. Each operation holds the shard lock for its
/// key for the whole read-modify-write, so claims are atomic per subject.
#[derive(Debug, Default)]
pub struct InMemoryQuotaStore {
    rows: DashMap<String, QuotaRecord>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a row as-is. Lets tests seed stale or full rows.
    pub fn insert(&self, record: QuotaRecord) {
        self.rows.insert(record.subject_id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn fresh_record(subject_id: &str, today: NaiveDate) -> QuotaRecord {
    QuotaRecord {
        subject_id: subject_id.to_string(),
        count: 1,
        last_action_date: today,
        updated_at: Utc::now(),
    }
}

fn bump(record: &mut QuotaRecord, today: NaiveDate) {
    if record.is_fresh(today) {
        record.count = record.count.saturating_add(1);
    } else {
        record.count = 1;
        record.last_action_date = today;
    }
    record.updated_at = Utc::now();
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn get(&self, subject_id: &str) -> Result<Option<QuotaRecord>, StorageError> {
        Ok(self.rows.get(subject_id).map(|entry| entry.clone()))
    }

    async fn upsert_fresh(
        &self,
        subject_id: &str,
        today: NaiveDate,
    ) -> Result<QuotaRecord, StorageError> {
        let record = fresh_record(subject_id, today);
        self.rows.insert(subject_id.to_string(), record.clone());
        Ok(record)
    }

    async fn increment_or_reset(
        &self,
        subject_id: &str,
        today: NaiveDate,
    ) -> Result<QuotaRecord, StorageError> {
        match self.rows.entry(subject_id.to_string()) {
            Entry::Occupied(mut entry) => {
                bump(entry.get_mut(), today);
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => Ok(entry.insert(fresh_record(subject_id, today)).clone()),
        }
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

        match self.rows.entry(subject_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().used_on(today) >= limit {
                    return Ok(None);
                }
                bump(entry.get_mut(), today);
                Ok(Some(entry.get().clone()))
            }
            Entry::Vacant(entry) => Ok(Some(
                entry.insert(fresh_record(subject_id, today)).clone(),
            )),
        }
    }

    async fn release(
        &self,
        subject_id: &str,
        today: NaiveDate,
    ) -> Result<Option<QuotaRecord>, StorageError> {
        let Some(mut record) = self.rows.get_mut(subject_id) else {
            return Ok(None);
        };

        if !record.is_fresh(today) || record.count == 0 {
            return Ok(None);
        }

        record.count -= 1;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }
}
