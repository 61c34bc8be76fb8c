use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracker::{QuotaStatus, QuotaUsage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectRequest {
    pub subject_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckQuotaResponse {
    pub allowed: bool,
    pub remaining: u64,
    pub limit: u64,
    pub used: u64,
    pub resets_at: DateTime<Utc>,
}

impl CheckQuotaResponse {
    pub fn new(status: QuotaStatus, resets_at: DateTime<Utc>) -> Self {
        Self {
            allowed: status.allowed,
            remaining: status.remaining,
            limit: status.limit,
            used: status.used,
            resets_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsageResponse {
    pub remaining: u64,
    pub limit: u64,
    pub used: u64,
    pub resets_at: DateTime<Utc>,
}

impl QuotaUsageResponse {
    pub fn new(usage: QuotaUsage, resets_at: DateTime<Utc>) -> Self {
        Self {
            remaining: usage.remaining,
            limit: usage.limit,
            used: usage.used,
            resets_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub details: Option<serde_json::Value>,
}
