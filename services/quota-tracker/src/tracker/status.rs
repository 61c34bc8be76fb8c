use serde::{Deserialize, Serialize};

/// Outcome of a read-only quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub remaining: u64,
    pub limit: u64,
    pub used: u64,
}

impl QuotaStatus {
    pub fn from_usage(used: u64, limit: u64) -> Self {
        let remaining = limit.saturating_sub(used);
        Self {
            allowed: remaining > 0,
            remaining,
            limit,
            used,
        }
    }

    pub fn usage(&self) -> QuotaUsage {
        QuotaUsage {
            remaining: self.remaining,
            limit: self.limit,
            used: self.used,
        }
    }
}

/// Usage numbers without the allow/deny decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub remaining: u64,
    pub limit: u64,
    pub used: u64,
}

impl QuotaUsage {
    pub fn from_usage(used: u64, limit: u64) -> Self {
        QuotaStatus::from_usage(used, limit).usage()
    }
}
