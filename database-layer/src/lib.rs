//! Database layer for DiagnoCare
//!
//! Thin wrapper around a `sqlx` PostgreSQL pool:
//! - [`DatabasePool`] builds the pool from [`DatabaseConfig`] and runs the
//!   embedded migrations in `migrations/`
//! - [`TransactionManager`] opens transactions for multi-statement writes
//! - [`DatabaseError`] classifies driver errors, in particular unique
//!   constraint violations which domain crates surface as conflicts
//!
//! Repositories live in the domain crates and take a `PgPool` directly.

pub mod connection;
pub mod error;
pub mod transaction;

pub use connection::*;
pub use error::*;
pub use transaction::*;
