//! Diagnostic appointment booking and lifecycle
//!
//! Patients book a test at a center; the price of the test is copied into
//! the appointment at booking time and never recalculated. Center staff move
//! appointments through the [`lifecycle`] table and attach result reports,
//! which are stored through the [`storage::ReportUploader`] capability.
//!
//! Listings join center, test and patient summaries in the service layer so
//! the repositories stay single-table.

pub mod error;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod service;
pub mod storage;

pub use error::*;
pub use models::*;
pub use service::*;
pub use storage::{ReportFile, ReportUploader, UploadError};
