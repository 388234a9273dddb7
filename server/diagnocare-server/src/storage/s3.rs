//! S3-compatible report storage

use super::{object_key, public_url};
use crate::config::StorageConfig;
use appointment_service::{ReportUploader, UploadError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{error, info};

pub struct S3ReportUploader {
    client: Client,
    bucket: String,
    base_url: String,
}

impl S3ReportUploader {
    /// Build the client from the ambient AWS chain, overridden by explicit
    /// keys and endpoint when configured
    ///
    /// # Errors
    ///
    /// Returns an error when the bucket name is empty.
    pub async fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        if config.bucket.trim().is_empty() {
            anyhow::bail!("storage.bucket is required for the s3 backend");
        }
        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "Initializing S3 report storage"
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "diagnocare-config",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let base_url = config.public_base_url.clone().unwrap_or_else(|| match &config.endpoint {
            Some(endpoint) => public_url(endpoint, &config.bucket),
            None => format!(
                "https://{}.s3.{}.amazonaws.com",
                config.bucket, config.region
            ),
        });

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            base_url,
        })
    }
}

#[async_trait]
impl ReportUploader for S3ReportUploader {
    async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<String, UploadError> {
        let key = object_key(file_name);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                error!(bucket = %self.bucket, key = %key, error = %e, "Failed to upload report");
                UploadError(e.to_string())
            })?;

        info!(bucket = %self.bucket, key = %key, size, "Report uploaded");
        Ok(public_url(&self.base_url, &key))
    }
}
