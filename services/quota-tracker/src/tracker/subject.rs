use tracing::debug;

use super::QuotaError;

pub const MAX_SUBJECT_ID_LEN: usize = 255;

/// Rejects subject ids that can never name a real principal, before any
/// storage round-trip.
pub fn validate_subject_id(subject_id: &str) -> Result<(), QuotaError> {
    let invalid = subject_id.trim().is_empty()
        || subject_id.len() > MAX_SUBJECT_ID_LEN
        || subject_id.chars().any(char::is_control);

    if invalid {
        debug!(subject_len = subject_id.len(), "rejecting malformed subject id");
        return Err(QuotaError::InvalidSubject(subject_id.to_string()));
    }

    Ok(())
}
