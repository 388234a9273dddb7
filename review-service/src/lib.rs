//! Patient reviews of diagnostic centers
//!
//! A patient may review each of their completed appointments once. Every
//! create, update and delete recomputes the center's `rating` (mean) and
//! `total_reviews` (count) from the full review set inside the same unit of
//! work, see [`store::ReviewStore`]. [`ReviewService::reconcile`] repairs
//! aggregates that drifted through out-of-band edits.

pub mod aggregation;
pub mod error;
pub mod models;
pub mod service;
pub mod store;

pub use error::*;
pub use models::*;
pub use service::*;
