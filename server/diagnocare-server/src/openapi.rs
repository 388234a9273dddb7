use crate::handlers::{appointments, auth, center_admin, centers, health, reviews};
use crate::server::DiagnoCareServer;
use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub const SWAGGER_UI_PATH: &str = "/swagger-ui";
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness_check,
        auth::register,
        auth::verify_registration_otp,
        auth::forgot_password,
        auth::reset_password,
        auth::login,
        auth::profile,
        centers::list_centers,
        centers::get_center,
        centers::list_center_tests,
        centers::create_center,
        center_admin::dashboard,
        center_admin::list_tests,
        center_admin::add_test,
        center_admin::update_test,
        center_admin::delete_test,
        appointments::create_appointment,
        appointments::my_appointments,
        appointments::my_results,
        appointments::own_center_appointments,
        appointments::center_appointments_by_id,
        appointments::update_status,
        appointments::patient_update,
        appointments::patient_delete,
        appointments::upload_results,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        reviews::center_reviews,
        reviews::all_reviews,
        reviews::reconcile,
    ),
    components(schemas(
        crate::error::ApiErrorResponse,
        health::HealthResponse,
        auth::VerifyOtpRequest,
        auth::ForgotPasswordRequest,
        auth::ResetPasswordRequest,
        auth::OtpIssuedResponse,
        auth::ProfileResponse,
        appointments::ReportUpload,
        reviews::ReconcileRequest,
        auth_identity::Role,
        auth_identity::RegisterRequest,
        auth_identity::LoginRequest,
        auth_identity::AuthSession,
        auth_identity::UserProfile,
        auth_identity::UserSummary,
        center_service::Address,
        center_service::DiagnosticCenter,
        center_service::DiagnosticTest,
        center_service::CenterSummary,
        center_service::TestSummary,
        center_service::CreateCenterRequest,
        center_service::CreateTestRequest,
        center_service::UpdateTestRequest,
        appointment_service::AppointmentStatus,
        appointment_service::TestResult,
        appointment_service::Appointment,
        appointment_service::PatientAppointmentView,
        appointment_service::CenterAppointmentView,
        appointment_service::CenterAppointmentPage,
        appointment_service::CreateAppointmentRequest,
        appointment_service::PatientUpdateRequest,
        appointment_service::StatusUpdateRequest,
        appointment_service::StatusCounts,
        appointment_service::CenterDashboard,
        review_service::Review,
        review_service::CreateReviewRequest,
        review_service::UpdateReviewRequest,
        review_service::CenterReviewView,
        review_service::AdminReviewView,
        review_service::CenterRating,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "authentication", description = "Registration, OTP verification and login"),
        (name = "centers", description = "Diagnostic center directory"),
        (name = "center-admin", description = "Dashboard and test catalog of a center"),
        (name = "appointments", description = "Booking and appointment lifecycle"),
        (name = "reviews", description = "Center reviews and ratings"),
    ),
    info(
        title = "DiagnoCare API",
        version = "1.0.0",
        description = "Diagnostic appointment booking: centers, tests, appointments, results and reviews.",
        license(name = "AGPL-3.0-only"),
    ),
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI and the raw OpenAPI document
pub fn create_docs_routes() -> Router<DiagnoCareServer> {
    Router::new().merge(SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_JSON_PATH, ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_core_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/appointments",
            "/api/v1/appointments/{id}/status",
            "/api/v1/appointments/{id}/results",
            "/api/v1/reviews/admin/reconcile",
            "/api/v1/center-admin/dashboard",
            "/health/ready",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
