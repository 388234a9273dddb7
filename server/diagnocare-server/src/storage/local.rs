//! Filesystem report storage for development and single-node deployments

use super::{object_key, public_url, LOCAL_REPORTS_ROUTE};
use crate::config::StorageConfig;
use appointment_service::{ReportUploader, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tracing::{error, info};

pub struct LocalReportUploader {
    root: PathBuf,
    base_url: String,
}

impl LocalReportUploader {
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.local_directory.clone(),
            base_url: config
                .public_base_url
                .clone()
                .unwrap_or_else(|| LOCAL_REPORTS_ROUTE.to_string()),
        }
    }
}

#[async_trait]
impl ReportUploader for LocalReportUploader {
    async fn upload(
        &self,
        file_name: &str,
        _content_type: &str,
        bytes: Bytes,
    ) -> Result<String, UploadError> {
        let key = object_key(file_name);
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UploadError(format!("cannot create report directory: {e}")))?;
        }
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to write report");
            UploadError(format!("cannot write report: {e}"))
        })?;

        info!(key = %key, size = bytes.len(), "Report stored on disk");
        Ok(public_url(&self.base_url, &key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("diagnocare-reports-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_upload_writes_file_and_returns_url() {
        let root = temp_root();
        let uploader = LocalReportUploader::new(&StorageConfig {
            local_directory: root.clone(),
            ..StorageConfig::default()
        });

        let url = uploader
            .upload("lipid panel.pdf", "application/pdf", Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();

        assert!(url.starts_with("/uploads/reports/"));
        assert!(url.ends_with("-lipid_panel.pdf"));
        let key = url.trim_start_matches("/uploads/reports/");
        let stored = tokio::fs::read(root.join(key)).await.unwrap();
        assert_eq!(stored, b"%PDF-1.4");

        tokio::fs::remove_dir_all(root).await.unwrap();
    }

    #[tokio::test]
    async fn test_public_base_url_override() {
        let root = temp_root();
        let uploader = LocalReportUploader::new(&StorageConfig {
            local_directory: root.clone(),
            public_base_url: Some("https://files.example.com/r/".into()),
            ..StorageConfig::default()
        });
        let url = uploader
            .upload("x.pdf", "application/pdf", Bytes::from_static(b"1"))
            .await
            .unwrap();
        assert!(url.starts_with("https://files.example.com/r/"));
        tokio::fs::remove_dir_all(root).await.unwrap();
    }
}
