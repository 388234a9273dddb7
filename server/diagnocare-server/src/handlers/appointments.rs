//! Appointment booking and lifecycle endpoints

use crate::error::{api_success, api_success_with_message, ApiError, ApiErrorResponse, ApiResponse};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, AuthContext};
use crate::server::DiagnoCareServer;
use crate::types::CenterAppointmentQuery;
use appointment_service::{
    Appointment, CenterAppointmentPage, CreateAppointmentRequest, PatientAppointmentView,
    PatientUpdateRequest, ReportFile, StatusUpdateRequest,
};
use auth_identity::Role;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

const PATIENT: &[Role] = &[Role::Patient];
const STAFF: &[Role] = &[Role::Admin, Role::DiagnosticCenterAdmin];

/// Multipart body of a result upload
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportUpload {
    /// The report document
    #[schema(value_type = String, format = Binary)]
    pub report: Vec<u8>,
    pub summary: Option<String>,
}

/// Book a test; the current test price is frozen into the appointment
#[utoipa::path(
    post,
    path = "/api/v1/appointments",
    tag = "appointments",
    security(("bearer_auth" = [])),
    request_body = CreateAppointmentRequest,
    responses(
        (status = 201, description = "Appointment booked", body = Appointment),
        (status = 400, description = "Missing fields or test of another center", body = ApiErrorResponse),
        (status = 404, description = "Test or center not found", body = ApiErrorResponse)
    )
)]
pub async fn create_appointment(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateAppointmentRequest>,
) -> Result<(StatusCode, ApiResponse<Appointment>), ApiError> {
    auth.require_role(PATIENT)?;
    let appointment = server.appointments.create(auth.user_id(), request).await?;
    Ok((
        StatusCode::CREATED,
        api_success_with_message(appointment, "Appointment booked"),
    ))
}

/// The caller's appointments, newest first
#[utoipa::path(
    get,
    path = "/api/v1/appointments/my-appointments",
    tag = "appointments",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Appointments with center and test", body = [PatientAppointmentView]))
)]
pub async fn my_appointments(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
) -> Result<ApiResponse<Vec<PatientAppointmentView>>, ApiError> {
    auth.require_role(PATIENT)?;
    Ok(api_success(
        server.appointments.list_for_patient(auth.user_id()).await?,
    ))
}

/// The caller's confirmed and completed appointments
#[utoipa::path(
    get,
    path = "/api/v1/appointments/my-results",
    tag = "appointments",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Appointments with results or pending results", body = [PatientAppointmentView]))
)]
pub async fn my_results(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
) -> Result<ApiResponse<Vec<PatientAppointmentView>>, ApiError> {
    auth.require_role(PATIENT)?;
    Ok(api_success(server.appointments.list_results(auth.user_id()).await?))
}

/// Appointments of the caller's own center
#[utoipa::path(
    get,
    path = "/api/v1/appointments/center",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(CenterAppointmentQuery),
    responses(
        (status = 200, description = "One page of center appointments", body = CenterAppointmentPage),
        (status = 403, description = "No center associated with the caller", body = ApiErrorResponse)
    )
)]
pub async fn own_center_appointments(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<CenterAppointmentQuery>,
) -> Result<ApiResponse<CenterAppointmentPage>, ApiError> {
    center_appointments(&server, auth, None, query).await
}

/// Appointments of a given center; center admins always get their own
#[utoipa::path(
    get,
    path = "/api/v1/appointments/center/{center_id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(
        ("center_id" = Uuid, Path, description = "Center id, used by admins only"),
        CenterAppointmentQuery
    ),
    responses(
        (status = 200, description = "One page of center appointments", body = CenterAppointmentPage),
        (status = 403, description = "No center associated with the caller", body = ApiErrorResponse)
    )
)]
pub async fn center_appointments_by_id(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiPath(center_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<CenterAppointmentQuery>,
) -> Result<ApiResponse<CenterAppointmentPage>, ApiError> {
    center_appointments(&server, auth, Some(center_id), query).await
}

async fn center_appointments(
    server: &DiagnoCareServer,
    auth: AuthContext,
    center_id: Option<Uuid>,
    query: CenterAppointmentQuery,
) -> Result<ApiResponse<CenterAppointmentPage>, ApiError> {
    auth.require_role(STAFF)?;
    let filter = query.into_filter()?;
    let page = server
        .appointments
        .list_for_center(auth.caller, center_id, filter)
        .await?;
    Ok(api_success(page))
}

/// Staff status change, checked against the lifecycle table
#[utoipa::path(
    put,
    path = "/api/v1/appointments/{id}/status",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Appointment id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Appointment updated", body = Appointment),
        (status = 400, description = "Transition not allowed", body = ApiErrorResponse),
        (status = 404, description = "Appointment not found in the caller's center", body = ApiErrorResponse)
    )
)]
pub async fn update_status(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<StatusUpdateRequest>,
) -> Result<ApiResponse<Appointment>, ApiError> {
    auth.require_role(STAFF)?;
    let appointment = server
        .appointments
        .update_status(auth.caller, id, request)
        .await?;
    Ok(api_success_with_message(appointment, "Appointment updated successfully"))
}

/// Patient cancellation or reschedule of their own appointment
#[utoipa::path(
    put,
    path = "/api/v1/appointments/{id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Appointment id")),
    request_body = PatientUpdateRequest,
    responses(
        (status = 200, description = "Appointment updated", body = Appointment),
        (status = 400, description = "Transition or reschedule not allowed", body = ApiErrorResponse),
        (status = 403, description = "Patients may only cancel", body = ApiErrorResponse),
        (status = 404, description = "Not the caller's appointment", body = ApiErrorResponse)
    )
)]
pub async fn patient_update(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<PatientUpdateRequest>,
) -> Result<ApiResponse<Appointment>, ApiError> {
    auth.require_role(PATIENT)?;
    let appointment = server
        .appointments
        .patient_update(auth.user_id(), id, request)
        .await?;
    Ok(api_success_with_message(appointment, "Appointment updated successfully"))
}

/// Delete one of the caller's appointments unless it is completed
#[utoipa::path(
    delete,
    path = "/api/v1/appointments/{id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment deleted"),
        (status = 400, description = "Malformed id or completed appointment", body = ApiErrorResponse),
        (status = 404, description = "Not the caller's appointment", body = ApiErrorResponse)
    )
)]
pub async fn patient_delete(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiPath(raw_id): ApiPath<String>,
) -> Result<ApiResponse<()>, ApiError> {
    auth.require_role(PATIENT)?;
    server
        .appointments
        .patient_delete(auth.user_id(), &raw_id)
        .await?;
    Ok(api_success_with_message((), "Appointment deleted successfully"))
}

/// Upload the result report and complete the appointment
#[utoipa::path(
    post,
    path = "/api/v1/appointments/{id}/results",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Appointment id")),
    request_body(content = ReportUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Results attached", body = Appointment),
        (status = 400, description = "Missing file or cancelled appointment", body = ApiErrorResponse),
        (status = 404, description = "Appointment not found in the caller's center", body = ApiErrorResponse),
        (status = 500, description = "Report storage failed", body = ApiErrorResponse)
    )
)]
pub async fn upload_results(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<Appointment>, ApiError> {
    auth.require_role(&[Role::DiagnosticCenterAdmin])?;
    let mut multipart = multipart.map_err(|rejection| ApiError::validation(rejection.body_text()))?;

    let mut report = None;
    let mut summary = None;
    while let Some(field) = multipart.next_field().await? {
        match field.name().map(str::to_owned).as_deref() {
            Some("report") => {
                let file_name = field.file_name().unwrap_or("report").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                report = Some(ReportFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some("summary") => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    summary = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    let appointment = server
        .appointments
        .attach_results(auth.caller, id, report, summary)
        .await?;
    Ok(api_success_with_message(appointment, "Test results uploaded successfully"))
}
