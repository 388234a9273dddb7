//! Logging for DiagnoCare with PII redaction
//!
//! Patient emails, phone numbers and one-time codes must never reach log
//! sinks in clear text. Call sites pass such values through
//! [`mask_email`] or a [`PiiRedactor`] before recording them as fields.
//!
//! [`init_tracing`] installs the global subscriber: colored human readable
//! output when attached to a terminal in development, JSON lines otherwise.
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::{mask_email, PiiRedactor, RedactionConfig};
//!
//! assert_eq!(mask_email("john.doe@example.com"), "j***@e***");
//!
//! let redactor = PiiRedactor::new(RedactionConfig {
//!     hash_for_correlation: false,
//!     ..Default::default()
//! });
//! let line = redactor.redact("otp: 123456 sent to jane@example.org");
//! assert!(!line.contains("123456"));
//! assert!(!line.contains("jane@example.org"));
//! ```

pub mod config;
pub mod redactor;
pub mod subscriber;

pub use config::*;
pub use redactor::*;
pub use subscriber::*;
