//! DiagnoCare server - diagnostic appointment booking API
//!
//! Wires the domain crates into an axum application: bearer-token
//! authentication, JSON envelopes, report storage backends and the OpenAPI
//! document. The binary in `main.rs` adds configuration loading, logging
//! and the listener.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod storage;
pub mod types;

pub use error::*;
pub use server::DiagnoCareServer;

use crate::config::{AppConfig, StorageBackend};
use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Build the application router with all routes and middleware
pub fn create_app(server: DiagnoCareServer, config: &AppConfig) -> Router {
    let mut router = routes::create_routes().merge(openapi::create_docs_routes());

    if config.storage.backend == StorageBackend::Local && config.storage.public_base_url.is_none() {
        router = router.nest_service(
            storage::LOCAL_REPORTS_ROUTE,
            ServeDir::new(&config.storage.local_directory),
        );
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::create_cors_layer(&config.server.cors_origins))
                .layer(DefaultBodyLimit::max(config.server.max_body_bytes)),
        )
        .with_state(server)
}
