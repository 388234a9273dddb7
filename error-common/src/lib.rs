//! Common error handling utilities for DiagnoCare
//!
//! Every domain crate declares its own `thiserror` enum and reports a coarse
//! [`ErrorKind`] through the [`Categorized`] trait. The HTTP layer maps kinds
//! to status codes, so domain crates never depend on the web framework.
//!
//! # Error Categories
//!
//! - **Validation**: missing or malformed input, disallowed lifecycle moves
//! - **Authentication**: missing or invalid credentials
//! - **Forbidden**: role or ownership mismatch
//! - **NotFound**: missing entity, or an entity the caller does not own
//! - **Conflict**: duplicate review, duplicate test name, existing account
//! - **Upload**: report storage failure
//! - **Unknown**: everything else
//!
//! # Example
//!
//! ```rust
//! use error_common::{Categorized, ErrorKind};
//!
//! #[derive(Debug, thiserror::Error)]
//! enum BookingError {
//!     #[error("Test not found")]
//!     TestNotFound,
//! }
//!
//! impl Categorized for BookingError {
//!     fn kind(&self) -> ErrorKind {
//!         ErrorKind::NotFound
//!     }
//! }
//!
//! assert_eq!(BookingError::TestNotFound.kind().status_code(), 404);
//! ```

pub mod codes;
pub mod kind;
pub mod types;

pub use kind::*;
pub use types::*;
