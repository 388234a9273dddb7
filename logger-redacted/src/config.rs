// Logger configuration
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Output format of the global subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Colored output on a terminal, JSON otherwise
    Auto,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is not set
    pub default_filter: String,
    pub verbose: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Auto,
            default_filter: "diagnocare_server=info,tower_http=info,sqlx=warn".to_string(),
            verbose: false,
        }
    }
}
