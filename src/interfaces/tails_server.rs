//! Tails hosting service interface.

use std::path::Path;

use async_trait::async_trait;

use crate::tails::Result;

/// Interface for uploading tails files to a publicly reachable host.
///
/// Failures carry the server's diagnostic message in
/// [`TailsError::Upload`](crate::tails::TailsError::Upload).
#[async_trait]
pub trait TailsServer: Send + Sync {
    async fn upload_tails_file(&self, revoc_reg_id: &str, tails_file_path: &Path) -> Result<()>;
}
