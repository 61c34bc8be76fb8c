pub mod database;
pub mod error;
pub mod memory;
pub mod schema;
pub mod store;

pub use database::SqliteQuotaStore;
pub use error::StorageError;
pub use memory::InMemoryQuotaStore;
pub use store::{QuotaRecord, QuotaStore};

pub const QUOTA_DB_FILENAME: &str = "quotas.db";
