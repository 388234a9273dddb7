use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub jwt_secret: String,
    /// Token lifetime; 30 days unless configured
    pub token_ttl_hours: i64,
    pub otp_ttl_minutes: i64,
    pub password_min_length: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            token_ttl_hours: 24 * 30,
            otp_ttl_minutes: 10,
            password_min_length: 8,
        }
    }
}
