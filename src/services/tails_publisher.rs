//! Upload of tails files to the public tails server.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, RevocationError};
use crate::interfaces::TailsServer;
use crate::record::IssuerRevRegRecord;
use crate::services::RegistryLifecycleManager;
use crate::tails::{self, TailsConfig};
use crate::utils::retry::{is_retryable_upload, upload_backoff};

/// Hosts a generated registry's tails file and records its public URI.
pub struct TailsPublisher {
    server: Arc<dyn TailsServer>,
    manager: Arc<RegistryLifecycleManager>,
    base_url: String,
    max_attempts: usize,
}

impl TailsPublisher {
    pub fn new(
        server: Arc<dyn TailsServer>,
        manager: Arc<RegistryLifecycleManager>,
        base_url: impl Into<String>,
        max_attempts: usize,
    ) -> Self {
        Self {
            server,
            manager,
            base_url: base_url.into(),
            max_attempts,
        }
    }

    /// Build from tails configuration. Returns `None` without a public base URL.
    pub fn from_config(
        server: Arc<dyn TailsServer>,
        manager: Arc<RegistryLifecycleManager>,
        config: &TailsConfig,
    ) -> Option<Self> {
        let base_url = config.server_base_url.clone()?;
        Some(Self::new(
            server,
            manager,
            base_url,
            config.upload_max_attempts,
        ))
    }

    /// Public location of a registry's tails file.
    pub fn public_uri(&self, revoc_reg_id: &str) -> String {
        tails::hosted_uri(&self.base_url, revoc_reg_id)
    }

    /// Upload the record's tails file, then set its public URI.
    ///
    /// Transient upload failures are retried with exponential backoff. The
    /// record is only touched once the upload succeeded.
    #[tracing::instrument(name = "revreg.publish_tails", skip_all, fields(%record_id))]
    pub async fn publish(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let record = self.manager.record(record_id).await?;
        let (Some(revoc_reg_id), Some(tails_local_path)) =
            (record.revoc_reg_id(), record.tails_local_path())
        else {
            return Err(RevocationError::state(
                "upload tails file for",
                record.state(),
                "revocation registry is not yet generated",
            ));
        };

        (|| async {
            self.server
                .upload_tails_file(revoc_reg_id, tails_local_path)
                .await
        })
        .retry(upload_backoff(self.max_attempts))
        .when(is_retryable_upload)
        .notify(|e, delay: Duration| {
            warn!(%revoc_reg_id, error = %e, ?delay, "Tails upload failed, retrying");
        })
        .await?;

        let uri = self.public_uri(revoc_reg_id);
        info!(%revoc_reg_id, tails_public_uri = %uri, "Uploaded tails file");
        self.manager.set_tails_file_public_uri(record_id, &uri).await
    }
}
