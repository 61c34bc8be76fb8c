pub mod api;
pub mod clock;
pub mod config;
pub mod gate;
pub mod storage;
pub mod tracker;

use std::sync::Arc;

pub use api::{create_router, ApiState, ErrorResponse};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{QuotaTrackerConfig, StoreKind};
pub use gate::{GateError, GateMode, GatedOutcome, QuotaGate};
pub use storage::{InMemoryQuotaStore, QuotaRecord, QuotaStore, SqliteQuotaStore, StorageError};
pub use tracker::{QuotaError, QuotaStatus, QuotaTracker, QuotaUsage};

/// Builds the store selected by `config`.
pub fn open_store(config: &QuotaTrackerConfig) -> Result<Arc<dyn QuotaStore>, StorageError> {
    let store: Arc<dyn QuotaStore> = match config.store {
        StoreKind::Sqlite => Arc::new(SqliteQuotaStore::open(&config.data_dir)?),
        StoreKind::Memory => Arc::new(InMemoryQuotaStore::new()),
    };
    Ok(store)
}
