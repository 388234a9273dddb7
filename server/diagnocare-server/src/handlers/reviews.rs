//! Center reviews and rating maintenance

use crate::error::{api_success, api_success_with_message, ApiError, ApiErrorResponse, ApiResponse};
use crate::middleware::{ApiJson, ApiPath, AuthContext};
use crate::server::DiagnoCareServer;
use auth_identity::Role;
use axum::{extract::State, http::StatusCode};
use review_service::{
    AdminReviewView, CenterRating, CenterReviewView, CreateReviewRequest, Review,
    UpdateReviewRequest,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

const PATIENT: &[Role] = &[Role::Patient];

/// Optional target of a reconcile run; all centers when absent
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub center_id: Option<Uuid>,
}

/// Review a completed appointment
#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    tag = "reviews",
    security(("bearer_auth" = [])),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Bad rating, appointment not completed or already reviewed", body = ApiErrorResponse),
        (status = 403, description = "Not the caller's appointment", body = ApiErrorResponse),
        (status = 404, description = "Appointment not found", body = ApiErrorResponse)
    )
)]
pub async fn create_review(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateReviewRequest>,
) -> Result<(StatusCode, ApiResponse<Review>), ApiError> {
    auth.require_role(PATIENT)?;
    let review = server.reviews.create(auth.user_id(), request).await?;
    Ok((StatusCode::CREATED, api_success_with_message(review, "Review submitted")))
}

#[utoipa::path(
    put,
    path = "/api/v1/reviews/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Review id")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 403, description = "Not the caller's review", body = ApiErrorResponse),
        (status = 404, description = "Review not found", body = ApiErrorResponse)
    )
)]
pub async fn update_review(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateReviewRequest>,
) -> Result<ApiResponse<Review>, ApiError> {
    auth.require_role(PATIENT)?;
    let review = server.reviews.update(auth.user_id(), id, request).await?;
    Ok(api_success_with_message(review, "Review updated"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 403, description = "Not the caller's review", body = ApiErrorResponse),
        (status = 404, description = "Review not found", body = ApiErrorResponse)
    )
)]
pub async fn delete_review(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    auth.require_role(PATIENT)?;
    server.reviews.delete(auth.user_id(), id).await?;
    Ok(api_success_with_message((), "Review deleted"))
}

/// Public reviews of a center, newest first
#[utoipa::path(
    get,
    path = "/api/v1/reviews/center/{center_id}",
    tag = "reviews",
    params(("center_id" = Uuid, Path, description = "Center id")),
    responses((status = 200, description = "Reviews with author names", body = [CenterReviewView]))
)]
pub async fn center_reviews(
    State(server): State<DiagnoCareServer>,
    ApiPath(center_id): ApiPath<Uuid>,
) -> Result<ApiResponse<Vec<CenterReviewView>>, ApiError> {
    Ok(api_success(server.reviews.list_by_center(center_id).await?))
}

/// Every review for moderation
#[utoipa::path(
    get,
    path = "/api/v1/reviews/admin/all",
    tag = "reviews",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All reviews with author, center and appointment date", body = [AdminReviewView]),
        (status = 403, description = "Caller is not an admin", body = ApiErrorResponse)
    )
)]
pub async fn all_reviews(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
) -> Result<ApiResponse<Vec<AdminReviewView>>, ApiError> {
    auth.require_role(&[Role::Admin])?;
    Ok(api_success(server.reviews.list_all().await?))
}

/// Recompute center ratings from the stored reviews
#[utoipa::path(
    post,
    path = "/api/v1/reviews/admin/reconcile",
    tag = "reviews",
    security(("bearer_auth" = [])),
    request_body(content = ReconcileRequest, description = "Omit to reconcile every center"),
    responses(
        (status = 200, description = "Recomputed ratings", body = [CenterRating]),
        (status = 403, description = "Caller is not an admin", body = ApiErrorResponse),
        (status = 404, description = "Center not found", body = ApiErrorResponse)
    )
)]
pub async fn reconcile(
    State(server): State<DiagnoCareServer>,
    auth: AuthContext,
    request: Option<ApiJson<ReconcileRequest>>,
) -> Result<ApiResponse<Vec<CenterRating>>, ApiError> {
    auth.require_role(&[Role::Admin])?;
    let center_id = request.and_then(|ApiJson(body)| body.center_id);
    let ratings = server.reviews.reconcile(center_id).await?;
    let message = format!("Reconciled {} center rating(s)", ratings.len());
    Ok(api_success_with_message(ratings, message))
}
