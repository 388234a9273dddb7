use crate::{
    error::*,
    lifecycle,
    models::*,
    repository::AppointmentRepository,
    storage::{ReportFile, ReportUploader},
};
use auth_identity::{repository::UserRepository, Caller, Role, UserSummary};
use center_service::CenterService;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const RECENT_APPOINTMENTS: i64 = 5;
/// Read-check-write rounds before giving up on a contended appointment
const WRITE_ATTEMPTS: usize = 3;
const RESULT_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Completed, AppointmentStatus::Confirmed];

/// Booking, lifecycle and result handling for appointments
pub struct AppointmentService {
    appointments: Arc<dyn AppointmentRepository>,
    centers: Arc<CenterService>,
    users: Arc<dyn UserRepository>,
    uploader: Arc<dyn ReportUploader>,
}

impl AppointmentService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        centers: Arc<CenterService>,
        users: Arc<dyn UserRepository>,
        uploader: Arc<dyn ReportUploader>,
    ) -> Self {
        Self {
            appointments,
            centers,
            users,
            uploader,
        }
    }

    /// Book a test for a patient at the test's current price
    ///
    /// # Errors
    ///
    /// `Validation` for missing fields, a bad time or a test of another
    /// center; `NotFound` for an absent or inactive test or center.
    #[instrument(skip(self, request), fields(patient_id = %patient_id))]
    pub async fn create(
        &self,
        patient_id: Uuid,
        request: CreateAppointmentRequest,
    ) -> AppointmentResult<Appointment> {
        let (Some(center_id), Some(test_id), Some(date), Some(raw_time)) = (
            request.center_id,
            request.test_id,
            request.appointment_date,
            request.appointment_time.as_deref().filter(|t| !t.trim().is_empty()),
        ) else {
            return Err(AppointmentError::Validation("All fields are required".into()));
        };
        let time = parse_time(raw_time).ok_or_else(|| {
            AppointmentError::Validation("Invalid appointment time, expected HH:MM".into())
        })?;

        let test = self
            .centers
            .find_test(test_id)
            .await?
            .filter(|test| test.is_active)
            .ok_or_else(|| AppointmentError::NotFound("Test not found".into()))?;
        if test.center_id != center_id {
            return Err(AppointmentError::Validation(
                "This test is not offered by the selected center".into(),
            ));
        }
        self.centers.get_center(center_id).await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            center_id,
            test_id,
            appointment_date: date,
            appointment_time: time,
            status: AppointmentStatus::Scheduled,
            total_amount: test.price,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            cancellation_reason: None,
            result: None,
            created_at: now,
            updated_at: now,
        };
        let appointment = self.appointments.create(&appointment).await?;
        info!(appointment_id = %appointment.id, center_id = %center_id, "Appointment booked");
        Ok(appointment)
    }

    /// # Errors
    ///
    /// Storage failures only.
    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
    ) -> AppointmentResult<Vec<PatientAppointmentView>> {
        let appointments = self.appointments.list_for_patient(patient_id, None).await?;
        self.patient_views(appointments).await
    }

    /// Appointments of the patient that are confirmed or completed
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn list_results(
        &self,
        patient_id: Uuid,
    ) -> AppointmentResult<Vec<PatientAppointmentView>> {
        let appointments = self
            .appointments
            .list_for_patient(patient_id, Some(&RESULT_STATUSES))
            .await?;
        self.patient_views(appointments).await
    }

    /// Page through a center's appointments. A center-admin always sees
    /// their own center and the requested id is ignored.
    ///
    /// # Errors
    ///
    /// `Forbidden` when no center can be resolved for the caller.
    #[instrument(skip(self))]
    pub async fn list_for_center(
        &self,
        caller: Caller,
        requested_center: Option<Uuid>,
        filter: CenterAppointmentFilter,
    ) -> AppointmentResult<CenterAppointmentPage> {
        let center_id = self.resolve_center(caller, requested_center).await?;
        let (appointments, total) = self
            .appointments
            .list_for_center(center_id, &filter)
            .await?;
        Ok(CenterAppointmentPage {
            appointments: self.center_views(appointments).await?,
            total,
            page: filter.page,
            limit: filter.limit,
            total_pages: filter.total_pages(total),
        })
    }

    /// Staff status change, checked against the lifecycle table
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-staff callers, `NotFound` for an unknown
    /// appointment or one of another center, `InvalidTransition` for a
    /// move the table forbids.
    #[instrument(skip(self, request))]
    pub async fn update_status(
        &self,
        caller: Caller,
        appointment_id: Uuid,
        request: StatusUpdateRequest,
    ) -> AppointmentResult<Appointment> {
        let status = request
            .status
            .ok_or_else(|| AppointmentError::Validation("Status is required".into()))?;

        for _ in 0..WRITE_ATTEMPTS {
            let mut appointment = self.staff_appointment(caller, appointment_id).await?;
            let (previous, last_seen) = (appointment.status, appointment.updated_at);
            lifecycle::check_transition(previous, status)?;
            appointment.status = status;
            if request.notes.is_some() {
                appointment.notes.clone_from(&request.notes);
            }
            if request.cancellation_reason.is_some() {
                appointment
                    .cancellation_reason
                    .clone_from(&request.cancellation_reason);
            }
            appointment.updated_at = Utc::now();

            if let Some(saved) = self.appointments.update(&appointment, last_seen).await? {
                info!(%appointment_id, from = %previous, to = %status, "Appointment status changed");
                return Ok(saved);
            }
            debug!(%appointment_id, "Appointment changed concurrently, re-reading");
        }
        Err(AppointmentError::concurrent_update())
    }

    /// A patient's own change: cancel, or move the date and time
    ///
    /// # Errors
    ///
    /// `NotFound` unless the caller owns the appointment, `Forbidden` for
    /// any status other than `cancelled`, `Validation` for rescheduling a
    /// finished appointment, `InvalidTransition` for cancelling one.
    #[instrument(skip(self, request))]
    pub async fn patient_update(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
        request: PatientUpdateRequest,
    ) -> AppointmentResult<Appointment> {
        for _ in 0..WRITE_ATTEMPTS {
            let mut appointment = self.owned_appointment(patient_id, appointment_id).await?;
            let last_seen = appointment.updated_at;
            apply_patient_update(&mut appointment, &request)?;
            appointment.updated_at = Utc::now();

            if let Some(saved) = self.appointments.update(&appointment, last_seen).await? {
                info!(%appointment_id, status = %saved.status, "Appointment updated by patient");
                return Ok(saved);
            }
            debug!(%appointment_id, "Appointment changed concurrently, re-reading");
        }
        Err(AppointmentError::concurrent_update())
    }

    /// Delete one of the patient's appointments. The raw identifier is
    /// validated before any lookup.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed id or a completed appointment,
    /// `NotFound` unless the caller owns the appointment.
    #[instrument(skip(self))]
    pub async fn patient_delete(&self, patient_id: Uuid, raw_id: &str) -> AppointmentResult<()> {
        let appointment_id = Uuid::parse_str(raw_id.trim())
            .map_err(|_| AppointmentError::Validation("Invalid appointment ID format".into()))?;
        for _ in 0..WRITE_ATTEMPTS {
            let appointment = self.owned_appointment(patient_id, appointment_id).await?;
            if !lifecycle::is_deletable(appointment.status) {
                return Err(AppointmentError::Validation(
                    "Cannot delete completed appointments".into(),
                ));
            }
            if self
                .appointments
                .delete(appointment_id, appointment.updated_at)
                .await?
            {
                info!(%appointment_id, "Appointment deleted by patient");
                return Ok(());
            }
            debug!(%appointment_id, "Appointment changed concurrently, re-reading");
        }
        Err(AppointmentError::concurrent_update())
    }

    /// Store a result report and mark the appointment completed
    ///
    /// # Errors
    ///
    /// `Validation` without a file, `NotFound` for an appointment outside
    /// the admin's center, `InvalidTransition` for a cancelled appointment,
    /// `Upload` when storage rejects the report, `Conflict` when the
    /// appointment keeps changing underneath the write.
    #[instrument(skip(self, file, summary))]
    pub async fn attach_results(
        &self,
        caller: Caller,
        appointment_id: Uuid,
        file: Option<ReportFile>,
        summary: Option<String>,
    ) -> AppointmentResult<Appointment> {
        let file = file
            .filter(|f| !f.bytes.is_empty())
            .ok_or_else(|| AppointmentError::Validation("Please upload a report file".into()))?;
        let mut appointment = self.staff_appointment(caller, appointment_id).await?;
        lifecycle::check_result_attachment(appointment.status)?;

        let report_url = self
            .uploader
            .upload(&file.file_name, &file.content_type, file.bytes)
            .await
            .map_err(|e| {
                warn!(%appointment_id, error = %e, "Report upload failed");
                AppointmentError::Upload(e.to_string())
            })?;
        let result = TestResult {
            report_url,
            summary: summary.filter(|s| !s.trim().is_empty()),
            uploaded_at: Utc::now(),
        };

        for _ in 0..WRITE_ATTEMPTS {
            let last_seen = appointment.updated_at;
            lifecycle::check_result_attachment(appointment.status)?;
            appointment.result = Some(result.clone());
            appointment.status = AppointmentStatus::Completed;
            appointment.updated_at = Utc::now();

            if let Some(saved) = self.appointments.update(&appointment, last_seen).await? {
                info!(%appointment_id, "Test results attached");
                return Ok(saved);
            }
            debug!(%appointment_id, "Appointment changed concurrently, re-reading");
            appointment = self.staff_appointment(caller, appointment_id).await?;
        }
        Err(AppointmentError::concurrent_update())
    }

    /// Counters and recent bookings for a center-admin's own center
    ///
    /// # Errors
    ///
    /// `Forbidden` when the admin has no center.
    #[instrument(skip(self))]
    pub async fn dashboard(&self, admin_id: Uuid) -> AppointmentResult<CenterDashboard> {
        let center = self.centers.require_admin_center(admin_id).await?;
        let status_counts = self.appointments.count_by_status(center.id).await?;
        let today = Utc::now().date_naive();
        let today_appointments = self.appointments.count_on_date(center.id, today).await?;
        let active_tests = self.centers.count_tests(center.id).await?;
        let recent = self
            .appointments
            .recent_for_center(center.id, RECENT_APPOINTMENTS)
            .await?;

        Ok(CenterDashboard {
            center: center.summary(),
            total_appointments: status_counts.total(),
            active_tests,
            today_appointments,
            status_counts,
            recent_appointments: self.center_views(recent).await?,
        })
    }

    /// # Errors
    ///
    /// Storage failures only.
    pub async fn find(&self, appointment_id: Uuid) -> AppointmentResult<Option<Appointment>> {
        self.appointments.find_by_id(appointment_id).await
    }

    /// # Errors
    ///
    /// Storage failures only.
    pub async fn find_many(&self, ids: &[Uuid]) -> AppointmentResult<Vec<Appointment>> {
        self.appointments.find_many(ids).await
    }

    async fn owned_appointment(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
    ) -> AppointmentResult<Appointment> {
        self.appointments
            .find_by_id(appointment_id)
            .await?
            .filter(|a| a.patient_id == patient_id)
            .ok_or_else(AppointmentError::not_found)
    }

    async fn staff_appointment(
        &self,
        caller: Caller,
        appointment_id: Uuid,
    ) -> AppointmentResult<Appointment> {
        let appointment = match caller.role {
            Role::Admin => self.appointments.find_by_id(appointment_id).await?,
            Role::DiagnosticCenterAdmin => {
                let center = self.centers.require_admin_center(caller.user_id).await?;
                self.appointments
                    .find_by_id(appointment_id)
                    .await?
                    .filter(|a| a.center_id == center.id)
            }
            Role::Patient => {
                return Err(AppointmentError::Forbidden(
                    "Only center staff can manage appointments".into(),
                ))
            }
        };
        appointment.ok_or_else(AppointmentError::not_found)
    }

    async fn resolve_center(
        &self,
        caller: Caller,
        requested_center: Option<Uuid>,
    ) -> AppointmentResult<Uuid> {
        match caller.role {
            Role::DiagnosticCenterAdmin => {
                Ok(self.centers.require_admin_center(caller.user_id).await?.id)
            }
            Role::Admin => requested_center.ok_or_else(|| {
                AppointmentError::Forbidden("No diagnostic center specified".into())
            }),
            Role::Patient => Err(AppointmentError::Forbidden(
                "Only center staff can view center appointments".into(),
            )),
        }
    }

    async fn patient_views(
        &self,
        appointments: Vec<Appointment>,
    ) -> AppointmentResult<Vec<PatientAppointmentView>> {
        let center_ids: Vec<Uuid> = appointments.iter().map(|a| a.center_id).collect();
        let test_ids: Vec<Uuid> = appointments.iter().map(|a| a.test_id).collect();
        let centers = self.centers.center_summaries(&center_ids).await?;
        let tests = self.centers.test_summaries(&test_ids).await?;

        Ok(appointments
            .into_iter()
            .map(|appointment| PatientAppointmentView {
                center: centers.get(&appointment.center_id).cloned(),
                test: tests.get(&appointment.test_id).cloned(),
                appointment,
            })
            .collect())
    }

    async fn center_views(
        &self,
        appointments: Vec<Appointment>,
    ) -> AppointmentResult<Vec<CenterAppointmentView>> {
        let mut patient_ids: Vec<Uuid> = appointments.iter().map(|a| a.patient_id).collect();
        patient_ids.sort_unstable();
        patient_ids.dedup();
        let test_ids: Vec<Uuid> = appointments.iter().map(|a| a.test_id).collect();

        let patients: HashMap<Uuid, UserSummary> = self
            .users
            .find_many(&patient_ids)
            .await?
            .iter()
            .map(|user| (user.id, user.summary()))
            .collect();
        let tests = self.centers.test_summaries(&test_ids).await?;

        Ok(appointments
            .into_iter()
            .map(|appointment| CenterAppointmentView {
                patient: patients.get(&appointment.patient_id).cloned(),
                test: tests.get(&appointment.test_id).cloned(),
                appointment,
            })
            .collect())
    }
}

/// Apply a patient's reschedule and status request to `appointment`.
/// The date and time are checked before the status change.
fn apply_patient_update(
    appointment: &mut Appointment,
    request: &PatientUpdateRequest,
) -> AppointmentResult<()> {
    if request.appointment_date.is_some() || request.appointment_time.is_some() {
        if !lifecycle::is_reschedulable(appointment.status) {
            return Err(AppointmentError::Validation(
                "Only scheduled or confirmed appointments can be rescheduled".into(),
            ));
        }
        if let Some(date) = request.appointment_date {
            appointment.appointment_date = date;
        }
        if let Some(raw) = request.appointment_time.as_deref() {
            appointment.appointment_time = parse_time(raw).ok_or_else(|| {
                AppointmentError::Validation("Invalid appointment time, expected HH:MM".into())
            })?;
        }
    }

    if let Some(status) = request.status {
        if status != appointment.status && status != AppointmentStatus::Cancelled {
            return Err(AppointmentError::Forbidden(
                "Patients can only cancel appointments".into(),
            ));
        }
        lifecycle::check_transition(appointment.status, status)?;
        appointment.status = status;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryAppointmentRepository;
    use crate::storage::{MockReportUploader, UploadError};
    use auth_identity::{repository::InMemoryUserRepository, User};
    use center_service::repository::{InMemoryCenterRepository, InMemoryTestRepository};
    use center_service::{Address, CreateCenterRequest, CreateTestRequest, UpdateTestRequest};
    use chrono::{DateTime, Duration, NaiveDate};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    struct Fixture {
        service: Arc<AppointmentService>,
        centers: Arc<CenterService>,
        users: Arc<InMemoryUserRepository>,
    }

    fn fixture_on(
        appointments: Arc<dyn AppointmentRepository>,
        uploader: MockReportUploader,
    ) -> Fixture {
        let users = Arc::new(InMemoryUserRepository::new());
        let centers = Arc::new(CenterService::new(
            Arc::new(InMemoryCenterRepository::new()),
            Arc::new(InMemoryTestRepository::new()),
            users.clone(),
        ));
        let service = Arc::new(AppointmentService::new(
            appointments,
            Arc::clone(&centers),
            users.clone(),
            Arc::new(uploader),
        ));
        Fixture {
            service,
            centers,
            users,
        }
    }

    fn fixture_with(uploader: MockReportUploader) -> Fixture {
        fixture_on(Arc::new(InMemoryAppointmentRepository::new()), uploader)
    }

    fn fixture() -> Fixture {
        fixture_with(MockReportUploader::new())
    }

    async fn seed_user(users: &InMemoryUserRepository, email: &str, role: Role) -> Caller {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: email.split('@').next().unwrap_or_default().into(),
            email: email.into(),
            phone: Some("+1 555 0100".into()),
            password_hash: String::new(),
            role,
            is_active: true,
            is_verified: true,
            otp: None,
            created_at: now,
            updated_at: now,
        };
        users.create_user(&user).await.unwrap();
        Caller::new(user.id, role)
    }

    /// A center with one test priced at `price`; returns (admin, center id, test id)
    async fn seed_center(fx: &Fixture, email: &str, price: i64) -> (Caller, Uuid, Uuid) {
        let admin = seed_user(&fx.users, email, Role::DiagnosticCenterAdmin).await;
        let center = fx
            .centers
            .create_center(CreateCenterRequest {
                name: format!("Lab of {email}"),
                address: Address {
                    street: "1 Main St".into(),
                    city: "Springfield".into(),
                    ..Default::default()
                },
                phone: "555-0101".into(),
                email: email.into(),
                admin_id: Some(admin.user_id),
                ..Default::default()
            })
            .await
            .unwrap();
        let test = fx
            .centers
            .add_test(
                admin.user_id,
                CreateTestRequest {
                    name: "Complete Blood Count".into(),
                    category: "Hematology".into(),
                    price: Some(Decimal::new(price, 0)),
                    duration_minutes: Some(20),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        (admin, center.id, test.id)
    }

    fn booking(center_id: Uuid, test_id: Uuid, date: NaiveDate, time: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            center_id: Some(center_id),
            test_id: Some(test_id),
            appointment_date: Some(date),
            appointment_time: Some(time.into()),
            notes: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn report() -> ReportFile {
        ReportFile {
            file_name: "cbc.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: bytes::Bytes::from_static(b"%PDF-1.4"),
        }
    }

    fn status(status: AppointmentStatus) -> StatusUpdateRequest {
        StatusUpdateRequest {
            status: Some(status),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_price_is_frozen_at_booking() {
        let fx = fixture();
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;

        let first = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();
        assert_eq!(first.total_amount, Decimal::new(500, 0));
        assert_eq!(first.status, AppointmentStatus::Scheduled);

        fx.centers
            .update_test(
                admin.user_id,
                test_id,
                UpdateTestRequest {
                    price: Some(Decimal::new(700, 0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let second = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(4), "09:00"))
            .await
            .unwrap();
        assert_eq!(second.total_amount, Decimal::new(700, 0));

        let first = fx.service.find(first.id).await.unwrap().unwrap();
        assert_eq!(first.total_amount, Decimal::new(500, 0));
    }

    #[tokio::test]
    async fn test_create_requires_all_fields_and_known_test() {
        let fx = fixture();
        let (_, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;

        let mut missing = booking(center_id, test_id, day(3), "09:00");
        missing.appointment_time = None;
        let err = fx.service.create(patient.user_id, missing).await.unwrap_err();
        assert!(matches!(err, AppointmentError::Validation(ref m) if m == "All fields are required"));

        let err = fx
            .service
            .create(patient.user_id, booking(center_id, Uuid::new_v4(), day(3), "09:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppointmentError::NotFound(ref m) if m == "Test not found"));
    }

    #[tokio::test]
    async fn test_test_must_belong_to_center() {
        let fx = fixture();
        let (_, center_a, _) = seed_center(&fx, "a@example.com", 500).await;
        let (_, _, test_b) = seed_center(&fx, "b@example.com", 300).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;

        assert!(matches!(
            fx.service
                .create(patient.user_id, booking(center_a, test_b, day(3), "09:00"))
                .await,
            Err(AppointmentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_patient_listing_is_newest_first_with_joins() {
        let fx = fixture();
        let (_, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        for (d, t) in [(3, "09:00"), (5, "08:00"), (5, "11:30")] {
            fx.service
                .create(patient.user_id, booking(center_id, test_id, day(d), t))
                .await
                .unwrap();
        }

        let views = fx.service.list_for_patient(patient.user_id).await.unwrap();
        let order: Vec<(NaiveDate, String)> = views
            .iter()
            .map(|v| {
                (
                    v.appointment.appointment_date,
                    v.appointment.appointment_time.format("%H:%M").to_string(),
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                (day(5), "11:30".to_string()),
                (day(5), "08:00".to_string()),
                (day(3), "09:00".to_string()),
            ]
        );
        assert_eq!(views[0].center.as_ref().unwrap().phone, "555-0101");
        assert_eq!(views[0].test.as_ref().unwrap().name, "Complete Blood Count");
    }

    #[tokio::test]
    async fn test_other_patients_get_not_found() {
        let fx = fixture();
        let (_, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let owner = seed_user(&fx.users, "owner@example.com", Role::Patient).await;
        let other = seed_user(&fx.users, "other@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(owner.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();

        let cancel = PatientUpdateRequest {
            status: Some(AppointmentStatus::Cancelled),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.patient_update(other.user_id, appointment.id, cancel).await,
            Err(AppointmentError::NotFound(_))
        ));
        assert!(matches!(
            fx.service
                .patient_delete(other.user_id, &appointment.id.to_string())
                .await,
            Err(AppointmentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_patient_may_only_cancel() {
        let fx = fixture();
        let (_, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();

        let confirm = PatientUpdateRequest {
            status: Some(AppointmentStatus::Confirmed),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.patient_update(patient.user_id, appointment.id, confirm).await,
            Err(AppointmentError::Forbidden(_))
        ));

        let moved = fx
            .service
            .patient_update(
                patient.user_id,
                appointment.id,
                PatientUpdateRequest {
                    appointment_date: Some(day(9)),
                    appointment_time: Some("15:45".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.appointment_date, day(9));

        let cancelled = fx
            .service
            .patient_update(
                patient.user_id,
                appointment.id,
                PatientUpdateRequest {
                    status: Some(AppointmentStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

        // Cancelled appointments can no longer be moved
        assert!(matches!(
            fx.service
                .patient_update(
                    patient.user_id,
                    appointment.id,
                    PatientUpdateRequest {
                        appointment_date: Some(day(10)),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppointmentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_validates_id_and_protects_completed() {
        let mut uploader = MockReportUploader::new();
        uploader
            .expect_upload()
            .returning(|_, _, _| Ok("https://reports.example/cbc.pdf".to_string()));
        let fx = fixture_with(uploader);
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;

        let err = fx
            .service
            .patient_delete(patient.user_id, "not-a-uuid")
            .await
            .unwrap_err();
        assert!(matches!(err, AppointmentError::Validation(ref m) if m == "Invalid appointment ID format"));

        let appointment = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();
        fx.service
            .attach_results(admin, appointment.id, Some(report()), None)
            .await
            .unwrap();

        let err = fx
            .service
            .patient_delete(patient.user_id, &appointment.id.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppointmentError::Validation(ref m) if m == "Cannot delete completed appointments"));

        let removable = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(4), "10:00"))
            .await
            .unwrap();
        fx.service
            .patient_delete(patient.user_id, &removable.id.to_string())
            .await
            .unwrap();
        assert!(fx.service.find(removable.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_changes_follow_the_table() {
        let fx = fixture();
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();

        assert!(matches!(
            fx.service
                .update_status(admin, appointment.id, status(AppointmentStatus::Completed))
                .await,
            Err(AppointmentError::InvalidTransition { .. })
        ));

        let confirmed = fx
            .service
            .update_status(
                admin,
                appointment.id,
                StatusUpdateRequest {
                    status: Some(AppointmentStatus::Confirmed),
                    notes: Some("Fasting required".into()),
                    cancellation_reason: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(confirmed.notes.as_deref(), Some("Fasting required"));

        fx.service
            .update_status(admin, appointment.id, status(AppointmentStatus::Completed))
            .await
            .unwrap();
        assert!(matches!(
            fx.service
                .update_status(admin, appointment.id, status(AppointmentStatus::Cancelled))
                .await,
            Err(AppointmentError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_center_admin_is_scoped_to_own_center() {
        let fx = fixture();
        let (_, center_a, test_a) = seed_center(&fx, "a@example.com", 500).await;
        let (admin_b, _, _) = seed_center(&fx, "b@example.com", 300).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(patient.user_id, booking(center_a, test_a, day(3), "09:00"))
            .await
            .unwrap();

        assert!(matches!(
            fx.service
                .update_status(admin_b, appointment.id, status(AppointmentStatus::Confirmed))
                .await,
            Err(AppointmentError::NotFound(_))
        ));

        // A supplied center id is ignored for center admins
        let page = fx
            .service
            .list_for_center(admin_b, Some(center_a), CenterAppointmentFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        let system_admin = seed_user(&fx.users, "root@example.com", Role::Admin).await;
        let page = fx
            .service
            .list_for_center(system_admin, Some(center_a), CenterAppointmentFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.appointments[0].patient.as_ref().unwrap().email, "pat@example.com");

        assert!(matches!(
            fx.service
                .list_for_center(system_admin, None, CenterAppointmentFilter::default())
                .await,
            Err(AppointmentError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_center_listing_filters_and_pages() {
        let fx = fixture();
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let mut ids = Vec::new();
        for d in [7, 2, 5] {
            let a = fx
                .service
                .create(patient.user_id, booking(center_id, test_id, day(d), "09:00"))
                .await
                .unwrap();
            ids.push(a.id);
        }
        fx.service
            .update_status(admin, ids[0], status(AppointmentStatus::Cancelled))
            .await
            .unwrap();

        let page = fx
            .service
            .list_for_center(admin, None, CenterAppointmentFilter::new(None, Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!((page.total, page.total_pages), (3, 2));
        let dates: Vec<NaiveDate> = page
            .appointments
            .iter()
            .map(|v| v.appointment.appointment_date)
            .collect();
        assert_eq!(dates, vec![day(2), day(5)]);

        let scheduled = fx
            .service
            .list_for_center(
                admin,
                None,
                CenterAppointmentFilter::new(Some(AppointmentStatus::Scheduled), None, None),
            )
            .await
            .unwrap();
        assert_eq!(scheduled.total, 2);
    }

    #[tokio::test]
    async fn test_attach_results_completes_and_replaces() {
        let mut uploader = MockReportUploader::new();
        let mut seq = mockall::Sequence::new();
        uploader
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok("https://reports.example/v1.pdf".to_string()));
        uploader
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok("https://reports.example/v2.pdf".to_string()));
        let fx = fixture_with(uploader);
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();

        let done = fx
            .service
            .attach_results(admin, appointment.id, Some(report()), Some("Normal".into()))
            .await
            .unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);
        let result = done.result.unwrap();
        assert_eq!(result.report_url, "https://reports.example/v1.pdf");
        assert_eq!(result.summary.as_deref(), Some("Normal"));

        let redone = fx
            .service
            .attach_results(admin, appointment.id, Some(report()), None)
            .await
            .unwrap();
        assert_eq!(redone.result.unwrap().report_url, "https://reports.example/v2.pdf");

        let results = fx.service.list_results(patient.user_id).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_appointment_untouched() {
        let mut uploader = MockReportUploader::new();
        uploader
            .expect_upload()
            .returning(|_, _, _| Err(UploadError("bucket unavailable".into())));
        let fx = fixture_with(uploader);
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();

        assert!(matches!(
            fx.service
                .attach_results(admin, appointment.id, Some(report()), None)
                .await,
            Err(AppointmentError::Upload(_))
        ));
        let stored = fx.service.find(appointment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Scheduled);
        assert!(stored.result.is_none());
    }

    #[tokio::test]
    async fn test_results_need_a_file_and_a_live_appointment() {
        // No upload may happen on any of these paths
        let fx = fixture_with(MockReportUploader::new());
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let (other_admin, _, _) = seed_center(&fx, "other@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();

        assert!(matches!(
            fx.service.attach_results(admin, appointment.id, None, None).await,
            Err(AppointmentError::Validation(_))
        ));
        assert!(matches!(
            fx.service
                .attach_results(other_admin, appointment.id, Some(report()), None)
                .await,
            Err(AppointmentError::NotFound(_))
        ));

        fx.service
            .update_status(admin, appointment.id, status(AppointmentStatus::Cancelled))
            .await
            .unwrap();
        assert!(matches!(
            fx.service
                .attach_results(admin, appointment.id, Some(report()), None)
                .await,
            Err(AppointmentError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let fx = fixture();
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let today = Utc::now().date_naive();
        for offset in 0..7 {
            fx.service
                .create(
                    patient.user_id,
                    booking(center_id, test_id, today + Duration::days(offset % 2), "09:00"),
                )
                .await
                .unwrap();
        }

        let dashboard = fx.service.dashboard(admin.user_id).await.unwrap();
        assert_eq!(dashboard.total_appointments, 7);
        assert_eq!(dashboard.today_appointments, 4);
        assert_eq!(dashboard.active_tests, 1);
        assert_eq!(dashboard.status_counts.scheduled, 7);
        assert_eq!(dashboard.recent_appointments.len(), 5);

        let stranger = seed_user(&fx.users, "nocenter@example.com", Role::DiagnosticCenterAdmin).await;
        assert!(matches!(
            fx.service.dashboard(stranger.user_id).await,
            Err(AppointmentError::Forbidden(_))
        ));
    }

    /// Which write the gated repository holds back
    #[derive(Clone, Copy)]
    enum Gate {
        UpdateTo(AppointmentStatus),
        Delete,
    }

    /// Parks the first gated write until `release` fires, so another
    /// request can land between its read and its write
    struct GatedRepository {
        inner: InMemoryAppointmentRepository,
        gate: Gate,
        used: AtomicBool,
        parked: Notify,
        release: Notify,
    }

    impl GatedRepository {
        fn new(gate: Gate) -> Self {
            Self {
                inner: InMemoryAppointmentRepository::new(),
                gate,
                used: AtomicBool::new(false),
                parked: Notify::new(),
                release: Notify::new(),
            }
        }

        async fn hold(&self) {
            if !self.used.swap(true, Ordering::SeqCst) {
                self.parked.notify_one();
                self.release.notified().await;
            }
        }
    }

    #[async_trait::async_trait]
    impl AppointmentRepository for GatedRepository {
        async fn create(&self, appointment: &Appointment) -> AppointmentResult<Appointment> {
            self.inner.create(appointment).await
        }

        async fn find_by_id(&self, id: Uuid) -> AppointmentResult<Option<Appointment>> {
            self.inner.find_by_id(id).await
        }

        async fn find_many(&self, ids: &[Uuid]) -> AppointmentResult<Vec<Appointment>> {
            self.inner.find_many(ids).await
        }

        async fn list_for_patient(
            &self,
            patient_id: Uuid,
            statuses: Option<&[AppointmentStatus]>,
        ) -> AppointmentResult<Vec<Appointment>> {
            self.inner.list_for_patient(patient_id, statuses).await
        }

        async fn list_for_center(
            &self,
            center_id: Uuid,
            filter: &CenterAppointmentFilter,
        ) -> AppointmentResult<(Vec<Appointment>, i64)> {
            self.inner.list_for_center(center_id, filter).await
        }

        async fn recent_for_center(
            &self,
            center_id: Uuid,
            limit: i64,
        ) -> AppointmentResult<Vec<Appointment>> {
            self.inner.recent_for_center(center_id, limit).await
        }

        async fn count_by_status(&self, center_id: Uuid) -> AppointmentResult<StatusCounts> {
            self.inner.count_by_status(center_id).await
        }

        async fn count_on_date(&self, center_id: Uuid, date: NaiveDate) -> AppointmentResult<i64> {
            self.inner.count_on_date(center_id, date).await
        }

        async fn update(
            &self,
            appointment: &Appointment,
            last_seen: DateTime<Utc>,
        ) -> AppointmentResult<Option<Appointment>> {
            if matches!(self.gate, Gate::UpdateTo(status) if status == appointment.status) {
                self.hold().await;
            }
            self.inner.update(appointment, last_seen).await
        }

        async fn delete(&self, id: Uuid, last_seen: DateTime<Utc>) -> AppointmentResult<bool> {
            if matches!(self.gate, Gate::Delete) {
                self.hold().await;
            }
            self.inner.delete(id, last_seen).await
        }
    }

    fn uploader_once() -> MockReportUploader {
        let mut uploader = MockReportUploader::new();
        uploader
            .expect_upload()
            .times(1)
            .returning(|_, _, _| Ok("https://reports.example/cbc.pdf".to_string()));
        uploader
    }

    #[tokio::test]
    async fn test_late_cancel_cannot_undo_attached_results() {
        let repo = Arc::new(GatedRepository::new(Gate::UpdateTo(AppointmentStatus::Cancelled)));
        let fx = fixture_on(repo.clone(), uploader_once());
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();

        let service = Arc::clone(&fx.service);
        let appointment_id = appointment.id;
        let cancel = tokio::spawn(async move {
            service
                .patient_update(
                    patient.user_id,
                    appointment_id,
                    PatientUpdateRequest {
                        status: Some(AppointmentStatus::Cancelled),
                        ..Default::default()
                    },
                )
                .await
        });
        repo.parked.notified().await;

        let done = fx
            .service
            .attach_results(admin, appointment_id, Some(report()), Some("Normal".into()))
            .await
            .unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);
        repo.release.notify_one();

        let err = cancel.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            AppointmentError::InvalidTransition {
                from: AppointmentStatus::Completed,
                to: AppointmentStatus::Cancelled,
            }
        ));
        let stored = fx.service.find(appointment_id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Completed);
        assert_eq!(stored.result.unwrap().summary.as_deref(), Some("Normal"));
    }

    #[tokio::test]
    async fn test_late_delete_cannot_remove_completed_appointment() {
        let repo = Arc::new(GatedRepository::new(Gate::Delete));
        let fx = fixture_on(repo.clone(), uploader_once());
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();

        let service = Arc::clone(&fx.service);
        let raw_id = appointment.id.to_string();
        let delete = tokio::spawn(async move { service.patient_delete(patient.user_id, &raw_id).await });
        repo.parked.notified().await;

        fx.service
            .attach_results(admin, appointment.id, Some(report()), None)
            .await
            .unwrap();
        repo.release.notify_one();

        let err = delete.await.unwrap().unwrap_err();
        assert!(
            matches!(err, AppointmentError::Validation(ref m) if m == "Cannot delete completed appointments")
        );
        let stored = fx.service.find(appointment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn test_status_change_after_concurrent_write_uses_fresh_state() {
        let repo = Arc::new(GatedRepository::new(Gate::UpdateTo(AppointmentStatus::Confirmed)));
        let fx = fixture_on(repo.clone(), MockReportUploader::new());
        let (admin, center_id, test_id) = seed_center(&fx, "lab@example.com", 500).await;
        let patient = seed_user(&fx.users, "pat@example.com", Role::Patient).await;
        let appointment = fx
            .service
            .create(patient.user_id, booking(center_id, test_id, day(3), "09:00"))
            .await
            .unwrap();

        let service = Arc::clone(&fx.service);
        let appointment_id = appointment.id;
        let confirm = tokio::spawn(async move {
            service
                .update_status(admin, appointment_id, status(AppointmentStatus::Confirmed))
                .await
        });
        repo.parked.notified().await;

        let moved = fx
            .service
            .patient_update(
                patient.user_id,
                appointment_id,
                PatientUpdateRequest {
                    appointment_date: Some(day(9)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.appointment_date, day(9));
        repo.release.notify_one();

        // the confirm re-reads after losing the race and keeps the new date
        let confirmed = confirm.await.unwrap().unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
        assert_eq!(confirmed.appointment_date, day(9));
    }
}
