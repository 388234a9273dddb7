pub mod appointments;
pub mod auth;
pub mod center_admin;
pub mod centers;
pub mod health;
pub mod reviews;
