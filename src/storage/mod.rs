//! Record persistence.
//!
//! [`RecordStore`] is the only way the lifecycle manager reads or writes
//! registry records. The store owns the creation order: `insert` assigns the
//! record's sequence id and every query returns records earliest first.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::config::{StorageConfig, StorageType};
use crate::record::{IssuerRevRegRecord, RecordState};

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryRecordStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already stored: {0}")]
    AlreadyExists(Uuid),

    #[error("Revocation registry id already belongs to another record: {0}")]
    DuplicateRevocRegId(String),

    #[error("Sequence id of record {record_id} is {current}, refusing to reassign {requested}")]
    SequenceReassigned {
        record_id: Uuid,
        current: u64,
        requested: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Interface for registry record persistence.
///
/// Implementations must:
/// - Assign strictly increasing sequence ids on insert
/// - Keep `revoc_reg_id` unique across records
/// - Return query results ordered by sequence id
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record, returning it with its assigned sequence id.
    async fn insert(&self, record: IssuerRevRegRecord) -> Result<IssuerRevRegRecord>;

    /// Overwrite an existing record.
    ///
    /// Fails with `NotFound` if the record was never inserted.
    async fn update(&self, record: &IssuerRevRegRecord) -> Result<()>;

    /// Load a record by its record id.
    async fn get(&self, record_id: Uuid) -> Result<IssuerRevRegRecord>;

    /// Load the record that owns a revocation registry id.
    async fn find_by_revoc_reg_id(&self, revoc_reg_id: &str)
        -> Result<Option<IssuerRevRegRecord>>;

    /// All records for a credential definition, optionally in one state.
    async fn find_by_cred_def(
        &self,
        cred_def_id: &str,
        state: Option<RecordState>,
    ) -> Result<Vec<IssuerRevRegRecord>>;

    /// All records with unpublished pending revocations.
    async fn find_pending(&self) -> Result<Vec<IssuerRevRegRecord>>;
}

/// Initialize the record store selected by configuration.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<Arc<dyn RecordStore>, Box<dyn std::error::Error>> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: in-memory");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            let path = &config.sqlite.path;
            info!("Storage: sqlite at {}", path.display());

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let pool =
                sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path.display())).await?;
            let store = SqliteRecordStore::new(pool);
            store.init().await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err("SQLite feature not enabled".into())
        }
    }
}
