use serde::{Deserialize, Serialize};

/// SMTP delivery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Implicit TLS (port 465); `false` upgrades with STARTTLS
    pub implicit_tls: bool,
    pub from_email: String,
    pub from_name: String,
    /// Minutes a code stays valid, quoted in the message body
    pub code_ttl_minutes: i64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            implicit_tls: false,
            from_email: "noreply@diagnocare.local".to_string(),
            from_name: "DiagnoCare".to_string(),
            code_ttl_minutes: 10,
        }
    }
}

impl EmailConfig {
    /// Load email configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("EMAIL_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.enabled),
            smtp_host: std::env::var("SMTP_HOST").unwrap_or(defaults.smtp_host),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.smtp_port),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            implicit_tls: std::env::var("SMTP_IMPLICIT_TLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.implicit_tls),
            from_email: std::env::var("EMAIL_FROM").unwrap_or(defaults.from_email),
            from_name: std::env::var("EMAIL_FROM_NAME").unwrap_or(defaults.from_name),
            code_ttl_minutes: defaults.code_ttl_minutes,
        }
    }
}
