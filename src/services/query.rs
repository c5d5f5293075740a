//! Record query service.

use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, RevocationError};
use crate::record::{IssuerRevRegRecord, RecordState};
use crate::storage::{RecordStore, StorageError};

/// Cred-def-scoped and pending-scoped record lookups.
///
/// Every list is ordered by sequence id, earliest first.
#[derive(Clone)]
pub struct RecordQueryService {
    store: Arc<dyn RecordStore>,
}

impl RecordQueryService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Records for a credential definition, optionally in one state.
    pub async fn find_by_cred_def(
        &self,
        cred_def_id: &str,
        state: Option<RecordState>,
    ) -> Result<Vec<IssuerRevRegRecord>> {
        Ok(self.store.find_by_cred_def(cred_def_id, state).await?)
    }

    /// The record owning a revocation registry id.
    pub async fn find_by_id(&self, revoc_reg_id: &str) -> Result<IssuerRevRegRecord> {
        self.store
            .find_by_revoc_reg_id(revoc_reg_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(revoc_reg_id.to_string()).into())
    }

    /// The registry currently accepting revocations for a credential definition.
    pub async fn find_active(&self, cred_def_id: &str) -> Result<Option<IssuerRevRegRecord>> {
        let mut active = self
            .store
            .find_by_cred_def(cred_def_id, Some(RecordState::Active))
            .await?;
        if active.len() > 1 {
            warn!(
                cred_def_id,
                count = active.len(),
                "Multiple active revocation registries"
            );
            return Err(RevocationError::state(
                "select active registry in",
                RecordState::Active,
                format!(
                    "{} records are active for credential definition {cred_def_id}",
                    active.len()
                ),
            ));
        }
        Ok(active.pop())
    }

    /// The earliest generated or posted registry waiting to become active.
    pub async fn find_standby(&self, cred_def_id: &str) -> Result<Option<IssuerRevRegRecord>> {
        let records = self.store.find_by_cred_def(cred_def_id, None).await?;
        Ok(records
            .into_iter()
            .find(|r| matches!(r.state(), RecordState::Generated | RecordState::Posted)))
    }

    /// Records with unpublished pending revocations, across all cred defs.
    pub async fn find_pending(&self) -> Result<Vec<IssuerRevRegRecord>> {
        Ok(self.store.find_pending().await?)
    }
}
