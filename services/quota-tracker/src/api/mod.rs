use std::sync::Arc;

pub mod handlers;
pub mod router;
pub mod types;

pub use router::create_router;
pub use types::*;

use crate::config::QuotaTrackerConfig;
use crate::gate::QuotaGate;
use crate::tracker::QuotaTracker;

pub struct ApiState {
    pub tracker: QuotaTracker,
    pub gate: QuotaGate,
    pub config: Arc<QuotaTrackerConfig>,
}

impl ApiState {
    pub fn new(tracker: QuotaTracker, config: QuotaTrackerConfig) -> Self {
        let gate = QuotaGate::new(tracker.clone(), config.gate_mode);
        Self {
            tracker,
            gate,
            config: Arc::new(config),
        }
    }
}
