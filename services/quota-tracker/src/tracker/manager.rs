use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clock::{next_utc_midnight, Clock, SystemClock};
use crate::config::QuotaTrackerConfig;
use crate::storage::QuotaStore;

use super::error::QuotaError;
use super::status::{QuotaStatus, QuotaUsage};
use super::subject::validate_subject_id;

/// Per-subject daily quota over a [`QuotaStore`].
///
/// Days roll over lazily: a row written on an earlier UTC date reads as zero
/// usage and is overwritten by the next write. Nothing runs at midnight.
#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    daily_limit: u64,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn QuotaStore>, daily_limit: u64) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), daily_limit)
    }

    pub fn with_clock(store: Arc<dyn QuotaStore>, clock: Arc<dyn Clock>, daily_limit: u64) -> Self {
        Self {
            store,
            clock,
            daily_limit,
        }
    }

    pub fn from_config(store: Arc<dyn QuotaStore>, config: &QuotaTrackerConfig) -> Self {
        Self::new(store, config.daily_limit)
    }

    pub fn daily_limit(&self) -> u64 {
        self.daily_limit
    }

    pub fn resets_at(&self) -> DateTime<Utc> {
        next_utc_midnight(self.clock.now())
    }

    /// Read-only decision for one more action today.
    pub async fn check_quota(&self, subject_id: &str) -> Result<QuotaStatus, QuotaError> {
        validate_subject_id(subject_id)?;
        let today = self.clock.today();

        let used = self
            .store
            .get(subject_id)
            .await?
            .map(|record| record.used_on(today))
            .unwrap_or(0);

        let status = QuotaStatus::from_usage(used, self.daily_limit);
        debug!(
            subject_id,
            used = status.used,
            remaining = status.remaining,
            allowed = status.allowed,
            "checked quota"
        );
        Ok(status)
    }

    pub async fn get_quota(&self, subject_id: &str) -> Result<QuotaUsage, QuotaError> {
        Ok(self.check_quota(subject_id).await?.usage())
    }

    /// Records one completed action. Does not enforce the limit; callers
    /// check first and call this once per successful action.
    pub async fn increment_quota(&self, subject_id: &str) -> Result<QuotaUsage, QuotaError> {
        validate_subject_id(subject_id)?;
        let today = self.clock.today();

        let existing = self.store.get(subject_id).await?;
        let record = match existing {
            Some(record) if record.is_fresh(today) => {
                self.store.increment_or_reset(subject_id, today).await?
            }
            Some(record) => {
                debug!(
                    subject_id,
                    stale_date = %record.last_action_date,
                    stale_count = record.count,
                    "resetting quota for new day"
                );
                self.store.upsert_fresh(subject_id, today).await?
            }
            None => {
                info!(subject_id, "creating quota row");
                self.store.upsert_fresh(subject_id, today).await?
            }
        };

        let usage = QuotaUsage::from_usage(record.count, self.daily_limit);
        debug!(
            subject_id,
            used = usage.used,
            remaining = usage.remaining,
            "incremented quota"
        );
        Ok(usage)
    }

    /// Checks and records one action in a single conditional write.
    ///
    /// Concurrent callers for the same subject can never push `used` past
    /// the daily limit through this path.
    pub async fn claim_slot(&self, subject_id: &str) -> Result<QuotaUsage, QuotaError> {
        validate_subject_id(subject_id)?;
        let now = self.clock.now();
        let today = now.date_naive();

        match self
            .store
            .try_claim(subject_id, today, self.daily_limit)
            .await?
        {
            Some(record) => {
                let usage = QuotaUsage::from_usage(record.count, self.daily_limit);
                debug!(
                    subject_id,
                    used = usage.used,
                    remaining = usage.remaining,
                    "claimed quota slot"
                );
                Ok(usage)
            }
            None => {
                info!(subject_id, limit = self.daily_limit, "daily quota exhausted");
                Err(QuotaError::Exceeded {
                    subject_id: subject_id.to_string(),
                    limit: self.daily_limit,
                    used: self.daily_limit,
                    resets_at: next_utc_midnight(now),
                })
            }
        }
    }

    /// Hands back a slot claimed today whose action did not complete.
    pub async fn release_slot(&self, subject_id: &str) -> Result<QuotaUsage, QuotaError> {
        validate_subject_id(subject_id)?;
        let today = self.clock.today();

        match self.store.release(subject_id, today).await? {
            Some(record) => {
                debug!(subject_id, used = record.count, "released quota slot");
                Ok(QuotaUsage::from_usage(record.count, self.daily_limit))
            }
            None => self.get_quota(subject_id).await,
        }
    }
}
