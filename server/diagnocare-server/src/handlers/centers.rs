//! Public center directory and center creation

use crate::error::{api_success, api_success_with_message, ApiError, ApiErrorResponse, ApiResponse};
use crate::middleware::{ApiJson, ApiPath, AuthContext};
use crate::server::DiagnoCareServer;
use auth_identity::Role;
use axum::{extract::State, http::StatusCode};
use center_service::{CreateCenterRequest, DiagnosticCenter, DiagnosticTest};
use uuid::Uuid;

/// Active centers sorted by name
#[utoipa::path(
    get,
    path = "/api/v1/centers",
    tag = "centers",
    responses((status = 200, description = "Active diagnostic centers", body = [DiagnosticCenter]))
)]
pub async fn list_centers(
    State(server): State<DiagnoCareServer>,
) -> Result<ApiResponse<Vec<DiagnosticCenter>>, ApiError> {
    Ok(api_success(server.centers.list_centers().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/centers/{id}",
    tag = "centers",
    params(("id" = Uuid, Path, description = "Center id")),
    responses(
        (status = 200, description = "Center details", body = DiagnosticCenter),
        (status = 404, description = "Unknown or inactive center", body = ApiErrorResponse)
    )
)]
pub async fn get_center(
    State(server): State<DiagnoCareServer>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<DiagnosticCenter>, ApiError> {
    Ok(api_success(server.centers.get_center(id).await?))
}

/// Active tests of a center sorted by name
#[utoipa::path(
    get,
    path = "/api/v1/centers/{id}/tests",
    tag = "centers",
    params(("id" = Uuid, Path, description = "Center id")),
    responses(
        (status = 200, description = "Test catalog", body = [DiagnosticTest]),
        (status = 404, description = "Unknown or inactive center", body = ApiErrorResponse)
    )
)]
pub async fn list_center_tests(
    State(server): State<DiagnoCareServer>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<Vec<DiagnosticTest>>, ApiError> {
    Ok(api_success(server.centers.list_tests(id).await?))
}

/// Register a center and assign its admin
#[utoipa::path(
    post,
    path = "/api/v1/centers",
    tag = "centers",
    security(("bearer_auth" = [])),
    request_body = CreateCenterRequest,
    responses(
        (status = 201, description = "Center created", body = DiagnosticCenter),
        (status = 400, description = "Invalid input or admin already owns a center", body = ApiErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ApiErrorResponse)
    )
)]
pub async fn create_center(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateCenterRequest>,
) -> Result<(StatusCode, ApiResponse<DiagnosticCenter>), ApiError> {
    auth.require_role(&[Role::Admin])?;
    let center = server.centers.create_center(request).await?;
    Ok((
        StatusCode::CREATED,
        api_success_with_message(center, "Diagnostic center created"),
    ))
}
