use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticCenter {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: Address,
    pub phone: String,
    pub email: String,
    pub operating_hours: Option<String>,
    pub services: Vec<String>,
    pub admin_id: Uuid,
    pub is_active: bool,
    /// Mean review rating, 0 when unreviewed
    pub rating: f64,
    pub total_reviews: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiagnosticCenter {
    #[must_use]
    pub fn summary(&self) -> CenterSummary {
        CenterSummary {
            id: self.id,
            name: self.name.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Derived aggregate of a center's reviews
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub rating: f64,
    pub total_reviews: i64,
}

impl RatingSummary {
    pub const EMPTY: Self = Self {
        rating: 0.0,
        total_reviews: 0,
    };
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticTest {
    pub id: Uuid,
    pub center_id: Uuid,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub duration_minutes: i32,
    pub description: Option<String>,
    pub preparation_instructions: Option<String>,
    pub requirements: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiagnosticTest {
    #[must_use]
    pub fn summary(&self) -> TestSummary {
        TestSummary {
            id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            price: self.price,
            duration_minutes: self.duration_minutes,
        }
    }
}

/// Center details joined into a patient's appointment list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CenterSummary {
    pub id: Uuid,
    pub name: String,
    pub address: Address,
    pub phone: String,
}

/// Test details joined into appointment listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateCenterRequest {
    pub name: String,
    pub description: Option<String>,
    pub address: Address,
    pub phone: String,
    pub email: String,
    pub operating_hours: Option<String>,
    pub services: Vec<String>,
    pub admin_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateTestRequest {
    pub name: String,
    pub category: String,
    pub price: Option<Decimal>,
    pub duration_minutes: Option<i32>,
    pub description: Option<String>,
    pub preparation_instructions: Option<String>,
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateTestRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub duration_minutes: Option<i32>,
    pub description: Option<String>,
    pub preparation_instructions: Option<String>,
    pub requirements: Option<Vec<String>>,
}
