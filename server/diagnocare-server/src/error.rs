//! API error handling and response envelopes
//!
//! Every domain error reports an [`ErrorKind`] through
//! [`error_common::Categorized`]; [`ApiError`] turns that into an HTTP status
//! and the JSON error envelope:
//!
//! ```json
//! { "success": false, "message": "Test not found", "error": "not_found", "code": "RESOURCE_5001" }
//! ```
//!
//! Successful handlers wrap their payload in [`ApiResponse`].

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use error_common::{codes, Categorized, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, error};
use utoipa::ToSchema;

/// Error returned by every handler
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ErrorKind,
    code: &'static str,
    message: String,
    status: StatusCode,
}

/// JSON body of an error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub message: String,
    /// Error category, e.g. `validation_error`
    pub error: String,
    pub code: String,
}

/// JSON body of a successful response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.default_code(),
            message: message.into(),
            status: status_for(kind),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }

    /// Answer with `status` instead of the one derived from the kind
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Build from any categorized domain error, keeping its message and code
    pub fn from_categorized<E: Categorized + Display>(err: &E) -> Self {
        Self {
            kind: err.kind(),
            code: err.code(),
            message: err.to_string(),
            status: status_for(err.kind()),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(
                error_type = %self.kind,
                code = self.code,
                status_code = status.as_u16(),
                error = %self.message,
                "API error occurred"
            );
        } else {
            debug!(error_type = %self.kind, code = self.code, error = %self.message, "Request rejected");
        }

        let body = ApiErrorResponse {
            success: false,
            message: self.message,
            error: self.kind.as_str().to_string(),
            code: self.code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Successful response carrying `data`
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        message: None,
    }
}

/// Successful response carrying `data` and a human readable message
pub fn api_success_with_message<T>(data: T, message: impl Into<String>) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        message: Some(message.into()),
    }
}

macro_rules! categorized_into_api_error {
    ($($err:ty),* $(,)?) => {
        $(
            impl From<$err> for ApiError {
                fn from(err: $err) -> Self {
                    Self::from_categorized(&err)
                }
            }
        )*
    };
}

categorized_into_api_error!(
    auth_identity::IdentityError,
    center_service::CenterError,
    appointment_service::AppointmentError,
    review_service::ReviewError,
    database_layer::DatabaseError,
    error_common::DiagnoCareError,
);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text()).with_code(codes::validation::INVALID_FORMAT)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text()).with_code(codes::validation::INVALID_FORMAT)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text()).with_code(codes::validation::INVALID_FORMAT)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::validation(err.body_text())
                .with_code(codes::validation::INVALID_INPUT)
                .with_status(status);
        }
        Self::validation(format!("Invalid multipart body: {}", err.body_text()))
            .with_code(codes::validation::INVALID_FORMAT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_envelope() {
        let response = ApiError::not_found("Appointment not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Appointment not found");
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["code"], codes::resource::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_transition_is_bad_request() {
        let err: ApiError = appointment_service::AppointmentError::InvalidTransition {
            from: appointment_service::AppointmentStatus::Completed,
            to: appointment_service::AppointmentStatus::Scheduled,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::validation::INVALID_TRANSITION);

        let json = body_json(err.into_response()).await;
        assert_eq!(
            json["message"],
            "Cannot change appointment status from completed to scheduled"
        );
    }

    #[test]
    fn test_domain_kinds_map_to_status() {
        let conflict: ApiError =
            center_service::CenterError::Conflict("A test with this name already exists in this center".into())
                .into();
        assert_eq!(conflict.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let forbidden: ApiError =
            center_service::CenterError::Forbidden("No diagnostic center specified".into()).into();
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let upload: ApiError =
            appointment_service::AppointmentError::Upload("bucket unavailable".into()).into();
        assert_eq!(upload.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let auth: ApiError = auth_identity::IdentityError::InvalidCredentials.into();
        assert_eq!(auth.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_success_envelope_skips_empty_message() {
        let json = body_json(api_success(serde_json::json!({"id": 1})).into_response()).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], 1);
        assert!(json.get("message").is_none());

        let json = body_json(api_success_with_message((), "Appointment deleted").into_response()).await;
        assert_eq!(json["message"], "Appointment deleted");
    }
}
