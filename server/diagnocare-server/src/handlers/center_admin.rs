//! Endpoints for the admin of a diagnostic center: dashboard and test
//! catalog management

use crate::error::{api_success, api_success_with_message, ApiError, ApiErrorResponse, ApiResponse};
use crate::middleware::{ApiJson, ApiPath, AuthContext};
use crate::server::DiagnoCareServer;
use appointment_service::CenterDashboard;
use auth_identity::Role;
use axum::{extract::State, http::StatusCode};
use center_service::{CreateTestRequest, DiagnosticTest, UpdateTestRequest};
use uuid::Uuid;

const CENTER_ADMIN: &[Role] = &[Role::DiagnosticCenterAdmin];

/// Counts and recent bookings of the caller's center
#[utoipa::path(
    get,
    path = "/api/v1/center-admin/dashboard",
    tag = "center-admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard", body = CenterDashboard),
        (status = 403, description = "Not a center admin, or no center assigned", body = ApiErrorResponse)
    )
)]
pub async fn dashboard(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
) -> Result<ApiResponse<CenterDashboard>, ApiError> {
    auth.require_role(CENTER_ADMIN)?;
    Ok(api_success(server.appointments.dashboard(auth.user_id()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/center-admin/tests",
    tag = "center-admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active tests of the caller's center", body = [DiagnosticTest]),
        (status = 403, description = "Not a center admin, or no center assigned", body = ApiErrorResponse)
    )
)]
pub async fn list_tests(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
) -> Result<ApiResponse<Vec<DiagnosticTest>>, ApiError> {
    auth.require_role(CENTER_ADMIN)?;
    let center = server.centers.require_admin_center(auth.user_id()).await?;
    Ok(api_success(server.centers.list_tests(center.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/center-admin/tests",
    tag = "center-admin",
    security(("bearer_auth" = [])),
    request_body = CreateTestRequest,
    responses(
        (status = 201, description = "Test added", body = DiagnosticTest),
        (status = 400, description = "Invalid input or duplicate name", body = ApiErrorResponse),
        (status = 403, description = "Not a center admin, or no center assigned", body = ApiErrorResponse)
    )
)]
pub async fn add_test(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateTestRequest>,
) -> Result<(StatusCode, ApiResponse<DiagnosticTest>), ApiError> {
    auth.require_role(CENTER_ADMIN)?;
    let test = server.centers.add_test(auth.user_id(), request).await?;
    let message = format!("Test \"{}\" added successfully", test.name);
    Ok((StatusCode::CREATED, api_success_with_message(test, message)))
}

#[utoipa::path(
    put,
    path = "/api/v1/center-admin/tests/{id}",
    tag = "center-admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Test id")),
    request_body = UpdateTestRequest,
    responses(
        (status = 200, description = "Test updated", body = DiagnosticTest),
        (status = 400, description = "Invalid input or duplicate name", body = ApiErrorResponse),
        (status = 404, description = "Test not in the caller's center", body = ApiErrorResponse)
    )
)]
pub async fn update_test(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateTestRequest>,
) -> Result<ApiResponse<DiagnosticTest>, ApiError> {
    auth.require_role(CENTER_ADMIN)?;
    let test = server.centers.update_test(auth.user_id(), id, request).await?;
    Ok(api_success_with_message(test, "Test updated successfully"))
}

/// Soft delete: the test leaves the catalog, bookings keep their reference
#[utoipa::path(
    delete,
    path = "/api/v1/center-admin/tests/{id}",
    tag = "center-admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Test id")),
    responses(
        (status = 200, description = "Test deactivated"),
        (status = 404, description = "Test not in the caller's center", body = ApiErrorResponse)
    )
)]
pub async fn delete_test(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    auth.require_role(CENTER_ADMIN)?;
    server.centers.delete_test(auth.user_id(), id).await?;
    Ok(api_success_with_message((), "Test deleted successfully"))
}
