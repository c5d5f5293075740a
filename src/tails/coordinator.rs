//! Local staging of generated tails files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{path_component, Result, TailsError};

/// Directory under the tails root where the issuer writes new files.
const HOPPER_DIR: &str = ".hopper";

/// Derives local tails paths and moves generated files into place.
#[derive(Debug, Clone)]
pub struct TailsCoordinator {
    client_dir: PathBuf,
}

impl TailsCoordinator {
    /// Create a coordinator rooted at the issuer's local client directory.
    pub fn new(client_dir: impl Into<PathBuf>) -> Self {
        Self {
            client_dir: client_dir.into(),
        }
    }

    pub fn client_dir(&self) -> &Path {
        &self.client_dir
    }

    pub fn tails_root(&self) -> PathBuf {
        self.client_dir.join("tails")
    }

    /// Canonical location of a registry's tails file.
    ///
    /// Deterministic in `(revoc_reg_id, tails_hash)`, so regenerating against
    /// the same identifiers lands on the same file.
    pub fn local_path(&self, revoc_reg_id: &str, tails_hash: &str) -> Result<PathBuf> {
        Ok(self
            .tails_root()
            .join(path_component(revoc_reg_id)?)
            .join(path_component(tails_hash)?))
    }

    /// Scratch directory the issuer writes into for one generation attempt.
    pub fn hopper_dir(&self, record_id: Uuid) -> PathBuf {
        self.tails_root()
            .join(HOPPER_DIR)
            .join(record_id.to_string())
    }

    /// Create a fresh, empty hopper directory for a generation attempt.
    pub async fn prepare_hopper(&self, record_id: Uuid) -> Result<PathBuf> {
        let dir = self.hopper_dir(record_id);
        self.discard_hopper(record_id).await;
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Remove a hopper directory and anything left in it.
    pub async fn discard_hopper(&self, record_id: Uuid) {
        let dir = self.hopper_dir(record_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(path = %dir.display(), "Discarded tails hopper"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %dir.display(),
                error = %e,
                "Failed to discard tails hopper"
            ),
        }
    }

    /// Move a freshly generated tails file from the hopper to its canonical path.
    ///
    /// This is a rename, so no copy remains in the hopper. If the hopper file
    /// is gone but the canonical file already exists, an earlier attempt
    /// already moved it and the canonical path is returned.
    pub async fn relocate(
        &self,
        record_id: Uuid,
        revoc_reg_id: &str,
        tails_hash: &str,
    ) -> Result<PathBuf> {
        let source = self
            .hopper_dir(record_id)
            .join(path_component(tails_hash)?);
        let destination = self.local_path(revoc_reg_id, tails_hash)?;

        if !fs::try_exists(&source).await? {
            if fs::try_exists(&destination).await? {
                debug!(
                    path = %destination.display(),
                    "Tails file already in place"
                );
                self.discard_hopper(record_id).await;
                return Ok(destination);
            }
            return Err(TailsError::NotFound(source));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&source, &destination).await?;
        self.discard_hopper(record_id).await;

        debug!(
            from = %source.display(),
            to = %destination.display(),
            "Relocated tails file"
        );
        Ok(destination)
    }
}
