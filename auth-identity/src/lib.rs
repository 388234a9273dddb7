//! Identity management and user authentication for DiagnoCare
//!
//! This crate owns the `User` entity and everything needed to prove who a
//! caller is:
//! - registration with an emailed one-time code ([`otp`])
//! - password hashing with Argon2id ([`password`])
//! - login and HS256 bearer tokens ([`token`])
//! - password reset through the same one-time code machinery
//!
//! Storage is behind [`repository::UserRepository`] with an in-memory and a
//! PostgreSQL implementation.
//!
//! # Example
//!
//! ```rust
//! use auth_identity::{IdentityConfig, IdentityService, RegisterRequest};
//! use auth_identity::repository::InMemoryUserRepository;
//! use email_service::InMemoryCodeSender;
//! use std::sync::Arc;
//!
//! # async fn demo() -> auth_identity::Result<()> {
//! let sender = InMemoryCodeSender::new();
//! let service = IdentityService::new(
//!     Arc::new(InMemoryUserRepository::new()),
//!     Arc::new(sender.clone()),
//!     IdentityConfig::default(),
//! );
//!
//! let user_id = service
//!     .register(RegisterRequest {
//!         name: "Asha Rao".into(),
//!         email: "asha@example.com".into(),
//!         password: "s3cure-pass".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! let code = sender.last_code("asha@example.com").map(|c| c.code).unwrap_or_default();
//! let session = service.verify_registration_otp(user_id, &code).await?;
//! assert_eq!(session.user.id, user_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod otp;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

pub use config::*;
pub use error::*;
pub use models::*;
pub use service::*;
pub use token::*;
