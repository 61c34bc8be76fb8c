use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Persisted usage row for one subject.
///
/// `count` is only meaningful while `last_action_date` is the current UTC
/// date; a row from an earlier day is stale and reads as zero usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub subject_id: String,
    pub count: u64,
    pub last_action_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl QuotaRecord {
    pub fn is_fresh(&self, today: NaiveDate) -> bool {
        self.last_action_date == today
    }

    /// Usage counted against `today`.
    pub fn used_on(&self, today: NaiveDate) -> u64 {
        if self.is_fresh(today) {
            self.count
        } else {
            0
        }
    }
}

/// Row store backing the quota tracker.
///
/// Every method is a single round-trip; implementations must make each call
/// atomic with respect to other calls for the same subject.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get(&self, subject_id: &str) -> Result<Option<QuotaRecord>, StorageError>;

    /// Inserts or overwrites the row with `count = 1` on `today`.
    async fn upsert_fresh(
        &self,
        subject_id: &str,
        today: NaiveDate,
    ) -> Result<QuotaRecord, StorageError>;

    /// Adds one to a same-day row, resets a stale row to 1, inserts a missing
    /// row with 1. No limit is applied.
    async fn increment_or_reset(
        &self,
        subject_id: &str,
        today: NaiveDate,
    ) -> Result<QuotaRecord, StorageError>;

    /// Same as [`QuotaStore::increment_or_reset`] but only when the row is
    /// stale, missing, or below `limit`. `None` means the subject has used
    /// all of today's slots and nothing was written.
    async fn try_claim(
        &self,
        subject_id: &str,
        today: NaiveDate,
        limit: u64,
    ) -> Result<Option<QuotaRecord>, StorageError>;

    /// Gives back one slot claimed on `today`. `None` when there was nothing
    /// to give back (no row, stale row, or zero count).
    async fn release(
        &self,
        subject_id: &str,
        today: NaiveDate,
    ) -> Result<Option<QuotaRecord>, StorageError>;
}
