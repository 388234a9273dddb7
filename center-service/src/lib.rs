//! Diagnostic centers and their test catalogs
//!
//! A center is owned by exactly one `diagnostic_center_admin` user. Each
//! center curates its own tests; a test never belongs to more than one
//! center and is soft-deleted so past appointments keep their reference.
//! Among the active tests of a center, trimmed names are unique.
//!
//! The `rating`/`total_reviews` columns on a center are written only through
//! [`repository::CenterRepository::set_rating`] by the review aggregator.

pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use error::*;
pub use models::*;
pub use service::*;
