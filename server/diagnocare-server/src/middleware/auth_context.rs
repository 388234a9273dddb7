//! Bearer token authentication
//!
//! Handlers that need a signed-in caller take [`AuthContext`] as an
//! argument; the extractor validates the `Authorization: Bearer <token>`
//! header against the identity service and rejects with 401 otherwise.

use crate::error::ApiError;
use crate::server::DiagnoCareServer;
use auth_identity::{Caller, Role};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use error_common::codes;
use uuid::Uuid;

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub caller: Caller,
}

impl AuthContext {
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.caller.user_id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.caller.role
    }

    /// Require one of `roles`
    ///
    /// # Errors
    ///
    /// `Forbidden` when the caller holds none of them.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.caller.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Access denied. Role {} cannot access this resource",
                self.caller.role
            ))
            .with_code(codes::authorization::INSUFFICIENT_PERMISSIONS))
        }
    }
}

fn extract_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::authentication("Not authorized, no token"))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::authentication("Invalid Authorization header format. Expected: Bearer <token>")
        })
}

#[async_trait]
impl FromRequestParts<DiagnoCareServer> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DiagnoCareServer,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?;
        let claims = state.identity.authenticate(token)?;
        let user_id = claims.user_id()?;
        Ok(Self {
            caller: Caller::new(user_id, claims.role),
        })
    }
}
