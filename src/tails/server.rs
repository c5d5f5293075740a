//! HTTP tails server client.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio::fs;
use tracing::debug;

use super::{Result, TailsError};
use crate::interfaces::TailsServer;

/// Uploads tails files with `PUT {upload_url}/{revoc_reg_id}`.
pub struct HttpTailsServer {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpTailsServer {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), upload_url)
    }

    /// Use a preconfigured client (timeouts, TLS roots).
    pub fn with_client(client: reqwest::Client, upload_url: impl Into<String>) -> Self {
        Self {
            client,
            upload_url: upload_url.into(),
        }
    }

    fn target(&self, revoc_reg_id: &str) -> String {
        format!("{}/{}", self.upload_url.trim_end_matches('/'), revoc_reg_id)
    }
}

#[async_trait]
impl TailsServer for HttpTailsServer {
    async fn upload_tails_file(&self, revoc_reg_id: &str, tails_file_path: &Path) -> Result<()> {
        if !fs::try_exists(tails_file_path).await? {
            return Err(TailsError::NotFound(tails_file_path.to_path_buf()));
        }
        let content = fs::read(tails_file_path).await?;
        let target = self.target(revoc_reg_id);
        let size = content.len();

        let response = self
            .client
            .put(&target)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .send()
            .await
            .map_err(|e| TailsError::Upload {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = if body.is_empty() {
                status.to_string()
            } else {
                format!("{status}: {body}")
            };
            return Err(TailsError::Upload { reason });
        }

        debug!(%target, size, "Uploaded tails file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_joins_registry_id() {
        let server = HttpTailsServer::new("http://tails:6543/");
        assert_eq!(server.target("rr:4:x"), "http://tails:6543/rr:4:x");
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let server = HttpTailsServer::new("http://127.0.0.1:9");
        let result = server
            .upload_tails_file("rr", Path::new("/nonexistent/tails/file"))
            .await;
        assert!(matches!(result, Err(TailsError::NotFound(_))));
    }
}
