//! Tails file configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Configuration for local tails staging and public hosting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TailsConfig {
    /// Issuer's local client directory.
    /// Tails files are kept under `{client_dir}/tails/`.
    pub client_dir: PathBuf,

    /// Public base URL tails files are served from.
    /// A registry's public URI is `{server_base_url}/{revoc_reg_id}`.
    pub server_base_url: Option<String>,

    /// Upload endpoint of the tails server.
    /// Defaults to `server_base_url` when unset.
    pub upload_url: Option<String>,

    /// Maximum number of upload attempts before giving up.
    pub upload_max_attempts: usize,
}

impl Default for TailsConfig {
    fn default() -> Self {
        Self {
            client_dir: PathBuf::from("/var/revreg/indy_client"),
            server_base_url: None,
            upload_url: None,
            upload_max_attempts: default_upload_max_attempts(),
        }
    }
}

impl TailsConfig {
    /// Public URI a registry's tails file is served from, if hosting is configured.
    pub fn public_uri(&self, revoc_reg_id: &str) -> Option<String> {
        self.server_base_url
            .as_deref()
            .map(|base| super::hosted_uri(base, revoc_reg_id))
    }

    /// Upload endpoint, falling back to the public base URL.
    pub fn upload_url(&self) -> Option<&str> {
        self.upload_url
            .as_deref()
            .or(self.server_base_url.as_deref())
    }
}

fn default_upload_max_attempts() -> usize {
    5
}
