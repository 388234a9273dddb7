//! PostgreSQL-backed appointment repository

use crate::{
    error::{AppointmentError, AppointmentResult},
    models::*,
    repository::AppointmentRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

const COLUMNS: &str = "id, patient_id, center_id, test_id, appointment_date, appointment_time, \
     status, total_amount, notes, cancellation_reason, result_report_url, result_summary, \
     result_uploaded_at, created_at, updated_at";

#[derive(FromRow)]
struct AppointmentRow {
    id: Uuid,
    patient_id: Uuid,
    center_id: Uuid,
    test_id: Uuid,
    appointment_date: NaiveDate,
    appointment_time: NaiveTime,
    status: String,
    total_amount: Decimal,
    notes: Option<String>,
    cancellation_reason: Option<String>,
    result_report_url: Option<String>,
    result_summary: Option<String>,
    result_uploaded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = AppointmentError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(AppointmentError::Storage)?;
        let result = match (row.result_report_url, row.result_uploaded_at) {
            (Some(report_url), Some(uploaded_at)) => Some(TestResult {
                report_url,
                summary: row.result_summary,
                uploaded_at,
            }),
            _ => None,
        };
        Ok(Self {
            id: row.id,
            patient_id: row.patient_id,
            center_id: row.center_id,
            test_id: row.test_id,
            appointment_date: row.appointment_date,
            appointment_time: row.appointment_time,
            status,
            total_amount: row.total_amount,
            notes: row.notes,
            cancellation_reason: row.cancellation_reason,
            result,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert(rows: Vec<AppointmentRow>) -> AppointmentResult<Vec<Appointment>> {
    rows.into_iter().map(Appointment::try_from).collect()
}

/// PostgreSQL-backed appointment repository
pub struct PostgresAppointmentRepository {
    pool: PgPool,
}

impl PostgresAppointmentRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppointmentRepository for PostgresAppointmentRepository {
    async fn create(&self, appointment: &Appointment) -> AppointmentResult<Appointment> {
        debug!(appointment_id = %appointment.id, "Inserting appointment");
        let row: AppointmentRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO appointments (
                id, patient_id, center_id, test_id, appointment_date, appointment_time,
                status, total_amount, notes, cancellation_reason, result_report_url,
                result_summary, result_uploaded_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(appointment.id)
        .bind(appointment.patient_id)
        .bind(appointment.center_id)
        .bind(appointment.test_id)
        .bind(appointment.appointment_date)
        .bind(appointment.appointment_time)
        .bind(appointment.status.as_str())
        .bind(appointment.total_amount)
        .bind(&appointment.notes)
        .bind(&appointment.cancellation_reason)
        .bind(appointment.result.as_ref().map(|r| r.report_url.clone()))
        .bind(appointment.result.as_ref().and_then(|r| r.summary.clone()))
        .bind(appointment.result.as_ref().map(|r| r.uploaded_at))
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> AppointmentResult<Option<Appointment>> {
        let row: Option<AppointmentRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM appointments WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Appointment::try_from).transpose()
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppointmentResult<Vec<Appointment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<AppointmentRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM appointments WHERE id = ANY($1)"))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        convert(rows)
    }

    async fn list_for_patient(
        &self,
        patient_id: Uuid,
        statuses: Option<&[AppointmentStatus]>,
    ) -> AppointmentResult<Vec<Appointment>> {
        let statuses: Option<Vec<String>> =
            statuses.map(|s| s.iter().map(|status| status.as_str().to_string()).collect());
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS} FROM appointments
            WHERE patient_id = $1 AND ($2::TEXT[] IS NULL OR status = ANY($2))
            ORDER BY appointment_date DESC, appointment_time DESC
            "#
        ))
        .bind(patient_id)
        .bind(statuses)
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn list_for_center(
        &self,
        center_id: Uuid,
        filter: &CenterAppointmentFilter,
    ) -> AppointmentResult<(Vec<Appointment>, i64)> {
        let status = filter.status.map(AppointmentStatus::as_str);
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM appointments WHERE center_id = $1 AND ($2::TEXT IS NULL OR status = $2)",
        )
        .bind(center_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS} FROM appointments
            WHERE center_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY appointment_date ASC, appointment_time ASC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(center_id)
        .bind(status)
        .bind(i64::from(filter.limit))
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok((convert(rows)?, total))
    }

    async fn recent_for_center(
        &self,
        center_id: Uuid,
        limit: i64,
    ) -> AppointmentResult<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM appointments WHERE center_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(center_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn count_by_status(&self, center_id: Uuid) -> AppointmentResult<StatusCounts> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM appointments WHERE center_id = $1 GROUP BY status",
        )
        .bind(center_id)
        .fetch_all(&self.pool)
        .await?;
        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            let status = status.parse().map_err(AppointmentError::Storage)?;
            counts.add(status, count);
        }
        Ok(counts)
    }

    async fn count_on_date(&self, center_id: Uuid, date: NaiveDate) -> AppointmentResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM appointments WHERE center_id = $1 AND appointment_date = $2",
        )
        .bind(center_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn update(
        &self,
        appointment: &Appointment,
        last_seen: DateTime<Utc>,
    ) -> AppointmentResult<Option<Appointment>> {
        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            r#"
            UPDATE appointments SET
                appointment_date = $2, appointment_time = $3, status = $4, notes = $5,
                cancellation_reason = $6, result_report_url = $7, result_summary = $8,
                result_uploaded_at = $9, updated_at = $10
            WHERE id = $1 AND updated_at = $11
            RETURNING {COLUMNS}
            "#
        ))
        .bind(appointment.id)
        .bind(appointment.appointment_date)
        .bind(appointment.appointment_time)
        .bind(appointment.status.as_str())
        .bind(&appointment.notes)
        .bind(&appointment.cancellation_reason)
        .bind(appointment.result.as_ref().map(|r| r.report_url.clone()))
        .bind(appointment.result.as_ref().and_then(|r| r.summary.clone()))
        .bind(appointment.result.as_ref().map(|r| r.uploaded_at))
        .bind(appointment.updated_at)
        .bind(last_seen)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Appointment::try_from).transpose()
    }

    async fn delete(&self, id: Uuid, last_seen: DateTime<Utc>) -> AppointmentResult<bool> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1 AND updated_at = $2")
            .bind(id)
            .bind(last_seen)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
