use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("daily quota exceeded for subject {subject_id}: limit={limit}, used={used}")]
    Exceeded {
        subject_id: String,
        limit: u64,
        used: u64,
        resets_at: DateTime<Utc>,
    },
    #[error("invalid subject id: {0:?}")]
    InvalidSubject(String),
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),
}
