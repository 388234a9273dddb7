use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ReviewError, ReviewResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub appointment_id: Uuid,
    pub center_id: Uuid,
    /// 1 to 5
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Accept whole-star ratings from 1 to 5
///
/// # Errors
///
/// `Validation` for fractional or out-of-range values.
pub fn validate_rating(value: f64) -> ReviewResult<i16> {
    if value.fract() != 0.0 || !(1.0..=5.0).contains(&value) {
        return Err(ReviewError::Validation(
            "Rating must be an integer between 1 and 5".into(),
        ));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(value as i16)
}

/// Trim a comment, dropping it when nothing is left
#[must_use]
pub fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub appointment_id: Option<Uuid>,
    pub rating: Option<f64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateReviewRequest {
    pub rating: Option<f64>,
    pub comment: Option<String>,
}

/// Public listing entry for a center page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CenterReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub user_name: Option<String>,
}

/// Moderation listing entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub user_name: Option<String>,
    pub center_name: Option<String>,
    pub appointment_date: Option<NaiveDate>,
}

/// Aggregate written back to a center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CenterRating {
    pub center_id: Uuid,
    pub rating: f64,
    pub total_reviews: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert_eq!(validate_rating(1.0).unwrap(), 1);
        assert_eq!(validate_rating(5.0).unwrap(), 5);
        assert!(validate_rating(0.0).is_err());
        assert!(validate_rating(6.0).is_err());
        assert!(validate_rating(4.5).is_err());
        assert!(validate_rating(f64::NAN).is_err());
    }

    #[test]
    fn test_comment_is_trimmed() {
        assert_eq!(
            normalize_comment(Some("  Quick and clean  ".into())).as_deref(),
            Some("Quick and clean")
        );
        assert_eq!(normalize_comment(Some("   ".into())), None);
    }
}
