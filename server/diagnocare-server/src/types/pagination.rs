//! Query parameters of the center appointment listing

use crate::error::ApiError;
use appointment_service::{AppointmentStatus, CenterAppointmentFilter};
use error_common::codes;
use serde::Deserialize;
use utoipa::IntoParams;

/// `?status=&page=&limit=`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CenterAppointmentQuery {
    /// One of scheduled, confirmed, completed, cancelled; `all` or empty
    /// disables the filter
    #[param(example = "scheduled")]
    pub status: Option<String>,

    #[param(example = 1, minimum = 1)]
    pub page: Option<u32>,

    #[param(example = 10, minimum = 1, maximum = 100)]
    pub limit: Option<u32>,
}

impl CenterAppointmentQuery {
    /// Parse the status and clamp paging (page >= 1, limit 1..=100,
    /// default 10)
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown status.
    pub fn into_filter(self) -> Result<CenterAppointmentFilter, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("" | "all") => None,
            Some(raw) => Some(raw.parse::<AppointmentStatus>().map_err(|e| {
                ApiError::validation(e).with_code(codes::validation::INVALID_FORMAT)
            })?),
        };
        Ok(CenterAppointmentFilter::new(status, self.page, self.limit))
    }
}
