//! Report storage backends
//!
//! Both backends implement [`ReportUploader`] and are picked once at startup
//! from [`StorageConfig`]:
//! - [`S3ReportUploader`] writes to an S3-compatible bucket (AWS, MinIO)
//! - [`LocalReportUploader`] writes below a directory served by the API

pub mod local;
pub mod s3;

pub use local::LocalReportUploader;
pub use s3::S3ReportUploader;

use crate::config::{StorageBackend, StorageConfig};
use appointment_service::ReportUploader;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Default public prefix of locally stored reports
pub const LOCAL_REPORTS_ROUTE: &str = "/uploads/reports";

/// Build the configured uploader
///
/// # Errors
///
/// Propagates S3 client construction failures.
pub async fn uploader_from_config(
    config: &StorageConfig,
) -> anyhow::Result<Arc<dyn ReportUploader>> {
    match config.backend {
        StorageBackend::S3 => Ok(Arc::new(S3ReportUploader::new(config).await?)),
        StorageBackend::Local => Ok(Arc::new(LocalReportUploader::new(config))),
    }
}

/// Unique object key for an uploaded report, e.g.
/// `2024/06/01/3f2c...-blood_panel.pdf`
pub(crate) fn object_key(file_name: &str) -> String {
    let today = Utc::now().format("%Y/%m/%d");
    format!("{today}/{}-{}", Uuid::new_v4(), sanitize_file_name(file_name))
}

fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "report".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Join a public base URL and an object key with exactly one slash
pub(crate) fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}
