use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct UploadError(pub String);

/// A report file received from center staff
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Durable storage for result reports. Returns the URL the report can be
/// fetched from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportUploader: Send + Sync {
    async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<String, UploadError>;
}
