use crate::{error::*, models::*};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::cmp::Reverse;
use std::sync::Arc;
use uuid::Uuid;

mod postgres;

pub use postgres::PostgresAppointmentRepository;

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn create(&self, appointment: &Appointment) -> AppointmentResult<Appointment>;
    async fn find_by_id(&self, id: Uuid) -> AppointmentResult<Option<Appointment>>;
    async fn find_many(&self, ids: &[Uuid]) -> AppointmentResult<Vec<Appointment>>;
    /// A patient's appointments, newest date then newest time first.
    /// `statuses` restricts the result when given.
    async fn list_for_patient(
        &self,
        patient_id: Uuid,
        statuses: Option<&[AppointmentStatus]>,
    ) -> AppointmentResult<Vec<Appointment>>;
    /// One page of a center's appointments, earliest date then time first,
    /// together with the unpaged total.
    async fn list_for_center(
        &self,
        center_id: Uuid,
        filter: &CenterAppointmentFilter,
    ) -> AppointmentResult<(Vec<Appointment>, i64)>;
    async fn recent_for_center(
        &self,
        center_id: Uuid,
        limit: i64,
    ) -> AppointmentResult<Vec<Appointment>>;
    async fn count_by_status(&self, center_id: Uuid) -> AppointmentResult<StatusCounts>;
    async fn count_on_date(&self, center_id: Uuid, date: NaiveDate) -> AppointmentResult<i64>;
    /// Write `appointment` only if the stored row still carries the
    /// `updated_at` the caller read. `None` when the row is gone or was
    /// written in the meantime.
    async fn update(
        &self,
        appointment: &Appointment,
        last_seen: DateTime<Utc>,
    ) -> AppointmentResult<Option<Appointment>>;
    /// Delete only if the stored row still carries `last_seen`
    async fn delete(&self, id: Uuid, last_seen: DateTime<Utc>) -> AppointmentResult<bool>;
}

/// In-memory appointment repository for testing and development
pub struct InMemoryAppointmentRepository {
    appointments: Arc<DashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            appointments: Arc::new(DashMap::new()),
        }
    }

    fn matching(&self, keep: impl Fn(&Appointment) -> bool) -> Vec<Appointment> {
        self.appointments
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for InMemoryAppointmentRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn create(&self, appointment: &Appointment) -> AppointmentResult<Appointment> {
        self.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppointmentResult<Option<Appointment>> {
        Ok(self.appointments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppointmentResult<Vec<Appointment>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.appointments.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn list_for_patient(
        &self,
        patient_id: Uuid,
        statuses: Option<&[AppointmentStatus]>,
    ) -> AppointmentResult<Vec<Appointment>> {
        let mut found = self.matching(|a| {
            a.patient_id == patient_id && statuses.map_or(true, |s| s.contains(&a.status))
        });
        found.sort_by_key(|a| Reverse((a.appointment_date, a.appointment_time)));
        Ok(found)
    }

    async fn list_for_center(
        &self,
        center_id: Uuid,
        filter: &CenterAppointmentFilter,
    ) -> AppointmentResult<(Vec<Appointment>, i64)> {
        let mut found = self.matching(|a| {
            a.center_id == center_id && filter.status.map_or(true, |s| a.status == s)
        });
        found.sort_by_key(|a| (a.appointment_date, a.appointment_time));
        let total = to_i64(found.len());
        let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let page = found
            .into_iter()
            .skip(offset)
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn recent_for_center(
        &self,
        center_id: Uuid,
        limit: i64,
    ) -> AppointmentResult<Vec<Appointment>> {
        let mut found = self.matching(|a| a.center_id == center_id);
        found.sort_by_key(|a| Reverse(a.created_at));
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }

    async fn count_by_status(&self, center_id: Uuid) -> AppointmentResult<StatusCounts> {
        let mut counts = StatusCounts::default();
        for entry in self.appointments.iter() {
            if entry.value().center_id == center_id {
                counts.add(entry.value().status, 1);
            }
        }
        Ok(counts)
    }

    async fn count_on_date(&self, center_id: Uuid, date: NaiveDate) -> AppointmentResult<i64> {
        Ok(to_i64(
            self.matching(|a| a.center_id == center_id && a.appointment_date == date)
                .len(),
        ))
    }

    async fn update(
        &self,
        appointment: &Appointment,
        last_seen: DateTime<Utc>,
    ) -> AppointmentResult<Option<Appointment>> {
        // the shard lock is held from the comparison to the write
        let Some(mut entry) = self.appointments.get_mut(&appointment.id) else {
            return Ok(None);
        };
        if entry.updated_at != last_seen {
            return Ok(None);
        }
        *entry = appointment.clone();
        Ok(Some(appointment.clone()))
    }

    async fn delete(&self, id: Uuid, last_seen: DateTime<Utc>) -> AppointmentResult<bool> {
        Ok(self
            .appointments
            .remove_if(&id, |_, stored| stored.updated_at == last_seen)
            .is_some())
    }
}
