//! Placement checks shared by assignment, substitution and shift edits.
//!
//! Every function runs against an open [`StoreTx`], so the checks and the
//! write that follows them observe the same snapshot.

use tracing::debug;

use super::calendar::IsoWeek;
use super::domain::{AssignmentId, Professional, ProfessionalId, Shift};
use super::error::SchedulingError;
use super::formats::minutes_to_hours;
use super::policy::SchedulingPolicy;
use super::store::StoreTx;

/// Fails with `Conflict` when another active assignment holds `shift`.
pub fn ensure_shift_free(
    tx: &dyn StoreTx,
    shift: &Shift,
    exclude: Option<AssignmentId>,
) -> Result<(), SchedulingError> {
    match tx.active_assignment_for_shift(shift.id)? {
        Some(existing) if Some(existing.id) != exclude => Err(SchedulingError::Conflict(format!(
            "shift {} already has an active assignment ({})",
            shift.id, existing.id
        ))),
        _ => Ok(()),
    }
}

/// Minutes of active bookings for `professional_id` whose shift date falls
/// in `week`, ignoring `exclude`.
pub fn weekly_minutes(
    tx: &dyn StoreTx,
    professional_id: ProfessionalId,
    week: IsoWeek,
    exclude: Option<AssignmentId>,
) -> Result<i64, SchedulingError> {
    let bookings = tx.active_bookings(&week.range(), Some(professional_id))?;
    Ok(bookings
        .iter()
        .filter(|booking| Some(booking.assignment_id) != exclude)
        .map(|booking| booking.shift.duration_minutes())
        .sum())
}

pub fn ensure_within_cap(
    tx: &dyn StoreTx,
    policy: &SchedulingPolicy,
    professional_id: ProfessionalId,
    shift: &Shift,
    exclude: Option<AssignmentId>,
) -> Result<(), SchedulingError> {
    let week = IsoWeek::containing(shift.date);
    let booked = weekly_minutes(tx, professional_id, week, exclude)?;
    let projected = booked + shift.duration_minutes();

    debug!(
        professional_id = professional_id.0,
        week_start = %week.monday,
        booked_minutes = booked,
        projected_minutes = projected,
        "weekly hours check"
    );

    if projected > policy.weekly_cap_minutes() {
        return Err(SchedulingError::CapacityExceeded {
            professional_id,
            week_start: week.monday,
            projected_hours: minutes_to_hours(projected),
            cap_hours: policy.weekly_hours_cap,
        });
    }
    Ok(())
}

/// Full placement check for putting `professional` on `shift`.
pub fn ensure_assignable(
    tx: &dyn StoreTx,
    policy: &SchedulingPolicy,
    professional: &Professional,
    shift: &Shift,
    exclude: Option<AssignmentId>,
) -> Result<(), SchedulingError> {
    if !professional.active {
        return Err(SchedulingError::Validation(format!(
            "professional {} is inactive",
            professional.id
        )));
    }
    ensure_shift_free(tx, shift, exclude)?;
    ensure_within_cap(tx, policy, professional.id, shift, exclude)
}
