//! Layered server configuration
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. the file passed with `--config` (default `config/diagnocare`, any
//!    extension the `config` crate understands, optional)
//! 3. environment variables prefixed `DIAGNOCARE__`, e.g.
//!    `DIAGNOCARE__DATABASE__URL` or `DIAGNOCARE__AUTH__JWT_SECRET`
//!
//! CLI flags are applied on top by `main`.

use auth_identity::IdentityConfig;
use config::{Config, Environment, File};
use database_layer::DatabaseConfig;
use email_service::EmailConfig;
use error_common::DiagnoCareError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: IdentityConfig,
    pub email: EmailConfig,
    pub storage: StorageConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    /// Upper bound for request bodies, report uploads included
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

/// Where result reports are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores such as MinIO
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Prefix of the URLs handed back to clients
    pub public_base_url: Option<String>,
    /// Target directory of the local backend
    pub local_directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: "diagnocare-reports".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            public_base_url: None,
            local_directory: PathBuf::from("uploads/reports"),
        }
    }
}

/// Admin account created at startup when missing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub admin_name: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    /// Load defaults, the optional file and `DIAGNOCARE__*` variables
    ///
    /// # Errors
    ///
    /// Returns [`DiagnoCareError::ConfigError`] for unreadable or
    /// mistyped sources.
    pub fn load(path: &str) -> Result<Self, DiagnoCareError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("DIAGNOCARE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| DiagnoCareError::ConfigError(e.to_string()))
    }

    /// Reject settings the server cannot start with
    ///
    /// # Errors
    ///
    /// Returns [`DiagnoCareError::ConfigError`] describing the first problem.
    pub fn validate(&self) -> Result<(), DiagnoCareError> {
        if self.auth.jwt_secret.len() < 16 {
            return Err(DiagnoCareError::ConfigError(
                "auth.jwt_secret must be at least 16 characters".into(),
            ));
        }
        if self.auth.token_ttl_hours <= 0 || self.auth.otp_ttl_minutes <= 0 {
            return Err(DiagnoCareError::ConfigError(
                "auth token and OTP lifetimes must be positive".into(),
            ));
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.trim().is_empty() {
            return Err(DiagnoCareError::ConfigError(
                "storage.bucket is required for the s3 backend".into(),
            ));
        }
        Ok(())
    }

    /// Email settings with the code lifetime kept in step with auth
    #[must_use]
    pub fn email_config(&self) -> EmailConfig {
        EmailConfig {
            code_ttl_minutes: self.auth.otp_ttl_minutes,
            ..self.email.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.token_ttl_hours, 720);
        assert_eq!(config.auth.otp_ttl_minutes, 10);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert!(!config.email.enabled);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("config/does-not-exist").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.max_connections, 20);
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "short".into();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "a-long-enough-test-secret".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_s3_backend_needs_bucket() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "a-long-enough-test-secret".into();
        config.storage.backend = StorageBackend::S3;
        config.storage.bucket = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_email_ttl_follows_otp_ttl() {
        let mut config = AppConfig::default();
        config.auth.otp_ttl_minutes = 15;
        assert_eq!(config.email_config().code_ttl_minutes, 15);
    }
}
