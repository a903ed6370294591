use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use super::audit;
use super::domain::{
    Assignment, AssignmentChanges, AssignmentId, AssignmentStatus, AssignmentView, AuditAction,
    EntityKind, Professional, ProfessionalId, Shift, ShiftId,
};
use super::error::SchedulingError;
use super::policy::{Clock, SchedulingPolicy};
use super::rules;
use super::store::{AssignmentFilter, ScheduleStore, StoreTx};

/// Creates, edits and cancels assignments under the exclusivity and
/// weekly-hours rules.
pub struct AssignmentService<S> {
    store: Arc<S>,
    policy: SchedulingPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: ScheduleStore> AssignmentService<S> {
    pub fn new(store: Arc<S>, policy: SchedulingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn create(
        &self,
        professional_id: ProfessionalId,
        shift_id: ShiftId,
        actor: &str,
    ) -> Result<Assignment, SchedulingError> {
        let now = self.clock.now();
        let result: Result<Assignment, SchedulingError> = self.store.write(|tx| {
            let professional = load_professional(tx, professional_id)?;
            let shift = load_shift(tx, shift_id)?;
            rules::ensure_assignable(tx, &self.policy, &professional, &shift, None)?;

            let assignment = tx.insert_assignment(professional_id, shift_id, now)?;
            audit::record(
                tx,
                EntityKind::Assignment,
                assignment.id.0,
                AuditAction::Created,
                actor,
                now,
            )?;
            Ok(assignment)
        });

        match &result {
            Ok(assignment) => info!(
                assignment_id = assignment.id.0,
                professional_id = professional_id.0,
                shift_id = shift_id.0,
                actor,
                "assignment created"
            ),
            Err(err) => warn!(
                professional_id = professional_id.0,
                shift_id = shift_id.0,
                kind = err.kind(),
                error = %err,
                "assignment rejected"
            ),
        }
        result
    }

    /// Applies `changes`, re-running placement checks whenever the result is
    /// active and either the professional changed or the assignment is being
    /// reactivated.
    pub fn update(
        &self,
        id: AssignmentId,
        changes: AssignmentChanges,
        actor: &str,
    ) -> Result<Assignment, SchedulingError> {
        if changes.professional_id.is_none() && changes.status.is_none() {
            return Err(SchedulingError::Validation(
                "nothing to update: supply professional_id and/or status".to_string(),
            ));
        }

        let now = self.clock.now();
        self.store.write(|tx| {
            let current = load_assignment(tx, id)?;
            let mut updated = current.clone();
            if let Some(professional_id) = changes.professional_id {
                updated.professional_id = professional_id;
            }
            if let Some(status) = changes.status {
                updated.status = status;
            }

            let professional_changed = updated.professional_id != current.professional_id;
            let reactivated = current.status == AssignmentStatus::Cancelled
                && updated.status == AssignmentStatus::Active;

            if updated.status == AssignmentStatus::Active && (professional_changed || reactivated) {
                let professional = load_professional(tx, updated.professional_id)?;
                let shift = load_shift(tx, updated.shift_id)?;
                rules::ensure_assignable(tx, &self.policy, &professional, &shift, Some(id))?;
            } else if professional_changed {
                load_professional(tx, updated.professional_id)?;
            }

            tx.update_assignment(&updated)?;
            audit::record(
                tx,
                EntityKind::Assignment,
                id.0,
                AuditAction::Updated,
                actor,
                now,
            )?;
            info!(assignment_id = id.0, status = %updated.status, actor, "assignment updated");
            Ok(updated)
        })
    }

    /// Marks the assignment cancelled; rows are never deleted.
    pub fn cancel(&self, id: AssignmentId, actor: &str) -> Result<Assignment, SchedulingError> {
        let now = self.clock.now();
        let cancelled = self.store.write(|tx| cancel_in(tx, id, actor, now))?;
        info!(assignment_id = id.0, actor, "assignment cancelled");
        Ok(cancelled)
    }

    pub fn get(&self, id: AssignmentId) -> Result<AssignmentView, SchedulingError> {
        self.store.read(|tx| {
            let assignment = load_assignment(tx, id)?;
            let filter = AssignmentFilter {
                shift_id: Some(assignment.shift_id),
                ..AssignmentFilter::default()
            };
            tx.assignment_views(&filter)?
                .into_iter()
                .find(|view| view.id == id)
                .ok_or_else(|| SchedulingError::not_found("assignment", id.0))
        })
    }

    pub fn list(&self, filter: &AssignmentFilter) -> Result<Vec<AssignmentView>, SchedulingError> {
        if filter.range.is_inverted() {
            return Err(SchedulingError::Validation(
                "'from' must not be after 'to'".to_string(),
            ));
        }
        self.store
            .read(|tx| tx.assignment_views(filter).map_err(SchedulingError::from))
    }
}

/// Cancels an active assignment and records it; shared with substitution
/// approval.
pub(crate) fn cancel_in(
    tx: &mut dyn StoreTx,
    id: AssignmentId,
    actor: &str,
    at: NaiveDateTime,
) -> Result<Assignment, SchedulingError> {
    let mut assignment = load_assignment(tx, id)?;
    if assignment.status == AssignmentStatus::Cancelled {
        return Err(SchedulingError::InvalidState(format!(
            "assignment {id} is already cancelled"
        )));
    }

    assignment.status = AssignmentStatus::Cancelled;
    tx.update_assignment(&assignment)?;
    audit::record(
        tx,
        EntityKind::Assignment,
        id.0,
        AuditAction::Cancelled,
        actor,
        at,
    )?;
    Ok(assignment)
}

pub(crate) fn load_assignment(
    tx: &dyn StoreTx,
    id: AssignmentId,
) -> Result<Assignment, SchedulingError> {
    tx.assignment(id)?
        .ok_or_else(|| SchedulingError::not_found("assignment", id.0))
}

pub(crate) fn load_professional(
    tx: &dyn StoreTx,
    id: ProfessionalId,
) -> Result<Professional, SchedulingError> {
    tx.professional(id)?
        .ok_or_else(|| SchedulingError::not_found("professional", id.0))
}

pub(crate) fn load_shift(tx: &dyn StoreTx, id: ShiftId) -> Result<Shift, SchedulingError> {
    tx.shift(id)?
        .ok_or_else(|| SchedulingError::not_found("shift", id.0))
}
