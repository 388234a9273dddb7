//! Registration, OTP verification, password reset and login

use crate::error::{api_success, api_success_with_message, ApiError, ApiErrorResponse, ApiResponse};
use crate::middleware::{ApiJson, AuthContext};
use crate::server::DiagnoCareServer;
use auth_identity::{AuthSession, LoginRequest, RegisterRequest, UserProfile};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub user_id: Option<Uuid>,
    pub otp: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub user_id: Option<Uuid>,
    pub otp: String,
    pub new_password: String,
}

/// Identifies the account a code was sent to
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssuedResponse {
    pub user_id: Uuid,
}

/// Profile of the signed-in user
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    /// Center administered by the user, if any
    pub diagnostic_center_id: Option<Uuid>,
}

fn require_user_id(user_id: Option<Uuid>, message: &str) -> Result<Uuid, ApiError> {
    user_id.ok_or_else(|| ApiError::validation(message))
}

/// Start a registration and email a verification code
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "authentication",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Verification code sent", body = OtpIssuedResponse),
        (status = 400, description = "Invalid input or email already registered", body = ApiErrorResponse)
    )
)]
pub async fn register(
    State(server): State<DiagnoCareServer>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<ApiResponse<OtpIssuedResponse>, ApiError> {
    let user_id = server.identity.register(request).await?;
    Ok(api_success_with_message(
        OtpIssuedResponse { user_id },
        "OTP sent to your email. Please verify to complete registration.",
    ))
}

/// Confirm a registration code and sign the user in
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-registration-otp",
    tag = "authentication",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account activated", body = AuthSession),
        (status = 400, description = "Invalid or expired OTP", body = ApiErrorResponse),
        (status = 404, description = "User not found", body = ApiErrorResponse)
    )
)]
pub async fn verify_registration_otp(
    State(server): State<DiagnoCareServer>,
    ApiJson(request): ApiJson<VerifyOtpRequest>,
) -> Result<ApiResponse<AuthSession>, ApiError> {
    let user_id = require_user_id(request.user_id, "User ID and OTP are required")?;
    let session = server
        .identity
        .verify_registration_otp(user_id, &request.otp)
        .await?;
    Ok(api_success_with_message(session, "Registration completed successfully"))
}

/// Email a password reset code
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    tag = "authentication",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset code sent", body = OtpIssuedResponse),
        (status = 404, description = "No verified account with this email", body = ApiErrorResponse)
    )
)]
pub async fn forgot_password(
    State(server): State<DiagnoCareServer>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Result<ApiResponse<OtpIssuedResponse>, ApiError> {
    let user_id = server.identity.forgot_password(&request.email).await?;
    Ok(api_success_with_message(
        OtpIssuedResponse { user_id },
        "Password reset OTP sent to your email",
    ))
}

/// Set a new password using a reset code
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    tag = "authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced"),
        (status = 400, description = "Invalid or expired OTP", body = ApiErrorResponse),
        (status = 404, description = "User not found", body = ApiErrorResponse)
    )
)]
pub async fn reset_password(
    State(server): State<DiagnoCareServer>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    let user_id = require_user_id(request.user_id, "User ID, OTP and new password are required")?;
    server
        .identity
        .reset_password(user_id, &request.otp, &request.new_password)
        .await?;
    Ok(api_success_with_message((), "Password reset successfully"))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthSession),
        (status = 401, description = "Invalid credentials", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(server): State<DiagnoCareServer>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<ApiResponse<AuthSession>, ApiError> {
    let session = server.identity.login(request).await?;
    Ok(api_success_with_message(session, "Login successful"))
}

/// Profile of the signed-in user
#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    tag = "authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token", body = ApiErrorResponse)
    )
)]
pub async fn profile(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
) -> Result<ApiResponse<ProfileResponse>, ApiError> {
    let user = server.identity.profile(auth.user_id()).await?;
    let diagnostic_center_id = server
        .centers
        .find_center_for_admin(auth.user_id())
        .await?
        .map(|center| center.id);
    Ok(api_success(ProfileResponse {
        user,
        diagnostic_center_id,
    }))
}
