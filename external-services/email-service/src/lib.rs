//! One-time code delivery for DiagnoCare
//!
//! The identity service only needs to hand a code to a recipient, so the
//! capability is the [`CodeSender`] trait. Two implementations ship:
//!
//! - [`SmtpCodeSender`] builds the message with `mail-builder` and delivers
//!   it through `mail-send`
//! - [`LogCodeSender`] records that a code was issued (email disabled, local
//!   development)
//!
//! Senders are constructed once at startup from [`EmailConfig`] and injected
//! where needed.
//!
//! ```rust
//! use email_service::{CodePurpose, CodeSender, LogCodeSender};
//!
//! # async fn demo() -> email_service::EmailResult<()> {
//! LogCodeSender
//!     .send_code("patient@example.com", "123456", CodePurpose::Registration)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod sender;

pub use config::*;
pub use error::*;
pub use sender::*;
