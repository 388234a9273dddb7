//! Appointment status transitions
//!
//! | from \ to  | scheduled | confirmed | completed | cancelled |
//! |------------|-----------|-----------|-----------|-----------|
//! | scheduled  | no-op     | yes       | no        | yes       |
//! | confirmed  | no        | no-op     | yes       | yes       |
//! | completed  | no        | no        | no-op     | no        |
//! | cancelled  | no        | no        | no        | no-op     |
//!
//! Attaching results is handled separately: it is allowed from every
//! non-cancelled status and always lands in `completed`.

use crate::error::{AppointmentError, AppointmentResult};
use crate::models::AppointmentStatus;
use tracing::debug;

/// Statuses reachable from `from` by an explicit status change
#[must_use]
pub fn allowed_targets(from: AppointmentStatus) -> &'static [AppointmentStatus] {
    use AppointmentStatus::*;
    match from {
        Scheduled => &[Confirmed, Cancelled],
        Confirmed => &[Completed, Cancelled],
        Completed | Cancelled => &[],
    }
}

#[must_use]
pub fn is_terminal(status: AppointmentStatus) -> bool {
    allowed_targets(status).is_empty()
}

/// Validate a status change. Re-setting the current status is accepted.
///
/// # Errors
///
/// `InvalidTransition` when the table forbids the move.
pub fn check_transition(from: AppointmentStatus, to: AppointmentStatus) -> AppointmentResult<()> {
    if from == to || allowed_targets(from).contains(&to) {
        debug!(%from, %to, "Status transition accepted");
        return Ok(());
    }
    Err(AppointmentError::InvalidTransition { from, to })
}

/// # Errors
///
/// `InvalidTransition` towards `completed` for a cancelled appointment.
pub fn check_result_attachment(from: AppointmentStatus) -> AppointmentResult<()> {
    if from == AppointmentStatus::Cancelled {
        return Err(AppointmentError::InvalidTransition {
            from,
            to: AppointmentStatus::Completed,
        });
    }
    Ok(())
}

/// Whether the date and time may still be moved
#[must_use]
pub fn is_reschedulable(status: AppointmentStatus) -> bool {
    matches!(
        status,
        AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
    )
}

#[must_use]
pub fn is_deletable(status: AppointmentStatus) -> bool {
    status != AppointmentStatus::Completed
}
