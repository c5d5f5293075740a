//! Record cache shared by the lifecycle manager.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::record::IssuerRevRegRecord;

/// Last persisted version of each record the manager has touched.
///
/// Only holds records that the store has accepted. Constructed by the caller
/// and handed to the manager, so its lifetime is the caller's choice.
#[derive(Default)]
pub struct RecordCache {
    records: RwLock<HashMap<Uuid, IssuerRevRegRecord>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, record_id: Uuid) -> Option<IssuerRevRegRecord> {
        self.records.read().await.get(&record_id).cloned()
    }

    pub async fn put(&self, record: &IssuerRevRegRecord) {
        self.records
            .write()
            .await
            .insert(record.record_id(), record.clone());
    }

    pub async fn invalidate(&self, record_id: Uuid) {
        self.records.write().await.remove(&record_id);
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
