pub mod error;
pub mod manager;
pub mod status;
pub mod subject;

pub use error::QuotaError;
pub use manager::QuotaTracker;
pub use status::{QuotaStatus, QuotaUsage};
pub use subject::validate_subject_id;

pub const DEFAULT_DAILY_LIMIT: u64 = 15;
