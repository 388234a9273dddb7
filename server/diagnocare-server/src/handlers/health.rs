use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::DiagnoCareServer;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

/// Liveness and readiness report
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "2024-06-01T10:30:00Z")]
    pub timestamp: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Seconds since startup
    #[schema(example = 3600)]
    pub uptime: u64,
    /// `postgres`, `in-memory` or `unavailable`
    #[schema(example = "postgres")]
    pub database: String,
}

fn report(server: &DiagnoCareServer, status: &str, database: &str) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: server.started_at.elapsed().as_secs(),
        database: database.to_string(),
    }
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is up", body = HealthResponse))
)]
pub async fn health_check(
    State(server): State<DiagnoCareServer>,
) -> Result<ApiResponse<HealthResponse>, ApiError> {
    let database = if server.database.is_some() { "postgres" } else { "in-memory" };
    Ok(api_success(report(&server, "healthy", database)))
}

/// Readiness check against the database
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to serve traffic", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn readiness_check(State(server): State<DiagnoCareServer>) -> impl IntoResponse {
    let ready = server.is_ready().await;
    let (status, label, database) = match (ready, server.database.is_some()) {
        (true, true) => (StatusCode::OK, "ready", "postgres"),
        (true, false) => (StatusCode::OK, "ready", "in-memory"),
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", "unavailable"),
    };
    let body = ApiResponse {
        success: ready,
        data: report(&server, label, database),
        message: None,
    };
    (status, body)
}
