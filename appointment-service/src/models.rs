use auth_identity::UserSummary;
use center_service::{CenterSummary, TestSummary};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [Self; 4] = [
        Self::Scheduled,
        Self::Confirmed,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown appointment status '{s}'"))
    }
}

/// Uploaded result report of a completed appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub report_url: String,
    pub summary: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub center_id: Uuid,
    pub test_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "09:30")]
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    /// Test price at booking time
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub result: Option<TestResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parse a wall-clock time given as `HH:MM` (seconds are tolerated)
#[must_use]
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).ok_or_else(|| D::Error::custom("expected a time as HH:MM"))
    }
}

/// An appointment as the patient sees it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientAppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub center: Option<CenterSummary>,
    pub test: Option<TestSummary>,
}

/// An appointment as center staff see it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CenterAppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: Option<UserSummary>,
    pub test: Option<TestSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub center_id: Option<Uuid>,
    pub test_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    #[schema(example = "09:30")]
    pub appointment_time: Option<String>,
    pub notes: Option<String>,
}

/// Fields a patient may change on their own appointment
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PatientUpdateRequest {
    pub status: Option<AppointmentStatus>,
    pub appointment_date: Option<NaiveDate>,
    #[schema(example = "14:00")]
    pub appointment_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
}

/// Paging window and filter for a center's appointment list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenterAppointmentFilter {
    pub status: Option<AppointmentStatus>,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl CenterAppointmentFilter {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Normalize raw query values: page at least 1, limit within `1..=100`
    #[must_use]
    pub fn new(status: Option<AppointmentStatus>, page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            status,
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    #[must_use]
    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            return 1;
        }
        let limit = i64::from(self.limit);
        (total + limit - 1) / limit
    }
}

impl Default for CenterAppointmentFilter {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CenterAppointmentPage {
    pub appointments: Vec<CenterAppointmentView>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub scheduled: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: AppointmentStatus, count: i64) {
        match status {
            AppointmentStatus::Scheduled => self.scheduled += count,
            AppointmentStatus::Confirmed => self.confirmed += count,
            AppointmentStatus::Completed => self.completed += count,
            AppointmentStatus::Cancelled => self.cancelled += count,
        }
    }

    #[must_use]
    pub fn total(&self) -> i64 {
        self.scheduled + self.confirmed + self.completed + self.cancelled
    }
}

/// Overview of a center for its admin
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CenterDashboard {
    pub center: CenterSummary,
    pub total_appointments: i64,
    pub active_tests: i64,
    pub today_appointments: i64,
    pub status_counts: StatusCounts,
    pub recent_appointments: Vec<CenterAppointmentView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in AppointmentStatus::ALL {
            assert_eq!(status.as_str().parse::<AppointmentStatus>(), Ok(status));
        }
        assert!("pending".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn test_parse_time_accepts_hh_mm() {
        assert_eq!(parse_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_time(" 17:05:00 "), NaiveTime::from_hms_opt(17, 5, 0));
        assert_eq!(parse_time("25:00"), None);
        assert_eq!(parse_time("noon"), None);
    }

    #[test]
    fn test_filter_defaults_and_clamps() {
        let filter = CenterAppointmentFilter::default();
        assert_eq!((filter.page, filter.limit), (1, 10));
        assert_eq!(filter.offset(), 0);

        let filter = CenterAppointmentFilter::new(None, Some(0), Some(500));
        assert_eq!((filter.page, filter.limit), (1, 100));

        let filter = CenterAppointmentFilter::new(None, Some(3), Some(10));
        assert_eq!(filter.offset(), 20);
        assert_eq!(filter.total_pages(21), 3);
        assert_eq!(filter.total_pages(0), 1);
    }

    #[test]
    fn test_appointment_time_serializes_as_hh_mm() {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::nil(),
            patient_id: Uuid::nil(),
            center_id: Uuid::nil(),
            test_id: Uuid::nil(),
            appointment_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            appointment_time: NaiveTime::from_hms_opt(8, 15, 0).unwrap(),
            status: AppointmentStatus::Scheduled,
            total_amount: Decimal::new(500, 0),
            notes: None,
            cancellation_reason: None,
            result: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&appointment).unwrap();
        assert_eq!(json["appointmentTime"], "08:15");
        assert_eq!(json["appointmentDate"], "2024-07-01");
        assert_eq!(json["status"], "scheduled");
    }
}
