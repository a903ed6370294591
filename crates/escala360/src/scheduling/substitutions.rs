use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use super::assignments::{cancel_in, load_assignment, load_professional, load_shift};
use super::audit;
use super::calendar::{DateRange, IsoWeek};
use super::domain::{
    AssignmentId, AssignmentStatus, AuditAction, Booking, Decision, EntityKind, NewSubstitution,
    ProfessionalId, Shift, SubstitutionId, SubstitutionRequest, SubstitutionStatus,
};
use super::error::SchedulingError;
use super::formats::serialize_hours;
use super::policy::{Clock, SchedulingPolicy};
use super::rules;
use super::store::{ScheduleStore, StoreTx};

pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;

/// Runs the substitution workflow: request, suggest, decide.
pub struct SubstitutionService<S> {
    store: Arc<S>,
    policy: SchedulingPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: ScheduleStore> SubstitutionService<S> {
    pub fn new(store: Arc<S>, policy: SchedulingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    /// Files a pending request to hand `assignment_id` over to another
    /// professional.
    pub fn request(
        &self,
        new: &NewSubstitution,
        actor: &str,
    ) -> Result<SubstitutionRequest, SchedulingError> {
        let now = self.clock.now();
        let result: Result<SubstitutionRequest, SchedulingError> = self.store.write(|tx| {
            let assignment = load_assignment(tx, new.assignment_id)?;
            load_professional(tx, new.requesting_professional_id)?;
            let substitute = load_professional(tx, new.substitute_professional_id)?;

            if assignment.status != AssignmentStatus::Active {
                return Err(SchedulingError::InvalidState(format!(
                    "assignment {} is {}",
                    assignment.id, assignment.status
                )));
            }
            if new.requesting_professional_id == new.substitute_professional_id {
                return Err(SchedulingError::Validation(
                    "requester and substitute must be different professionals".to_string(),
                ));
            }
            if !substitute.active {
                return Err(SchedulingError::Validation(format!(
                    "substitute {} is inactive",
                    substitute.id
                )));
            }

            let shift = load_shift(tx, assignment.shift_id)?;
            let shift_start = shift.starts_at();
            if !self.policy.lead_time_satisfied(now, shift_start) {
                return Err(SchedulingError::LeadTimeViolation {
                    shift_start,
                    requested_at: now,
                    lead_hours: self.policy.substitution_lead_hours,
                });
            }

            let request = tx.insert_substitution(new, now)?;
            audit::record(
                tx,
                EntityKind::Substitution,
                request.id.0,
                AuditAction::Created,
                actor,
                now,
            )?;
            Ok(request)
        });

        match &result {
            Ok(request) => info!(
                substitution_id = request.id.0,
                assignment_id = new.assignment_id.0,
                actor,
                "substitution requested"
            ),
            Err(err) => warn!(
                assignment_id = new.assignment_id.0,
                kind = err.kind(),
                error = %err,
                "substitution request rejected"
            ),
        }
        result
    }

    /// Replacement candidates for the shift behind `assignment_id`.
    ///
    /// Professionals already booked on an overlapping shift are left out;
    /// the rest are ranked by hours booked in the target week.
    pub fn suggest(
        &self,
        assignment_id: AssignmentId,
        limit: usize,
    ) -> Result<SubstituteSuggestions, SchedulingError> {
        self.store.read(|tx| {
            let assignment = load_assignment(tx, assignment_id)?;
            let shift = load_shift(tx, assignment.shift_id)?;
            let pool = candidate_pool(tx, &shift)?;
            Ok(SubstituteSuggestions { pool, limit })
        })
    }

    /// Applies a supervisor decision; approval swaps the assignment in the
    /// same transaction.
    pub fn decide(
        &self,
        id: SubstitutionId,
        decision: Decision,
        actor: &str,
    ) -> Result<SubstitutionRequest, SchedulingError> {
        let now = self.clock.now();
        let result: Result<SubstitutionRequest, SchedulingError> = self.store.write(|tx| {
            let mut request = load_substitution(tx, id)?;
            if request.status != SubstitutionStatus::Pending {
                return Err(SchedulingError::InvalidState(format!(
                    "substitution {id} was already {}",
                    request.status
                )));
            }

            if decision == Decision::Approved {
                approve(tx, &self.policy, &request, actor, now)?;
            }

            request.status = decision.status();
            request.decided_at = Some(now);
            tx.update_substitution(&request)?;
            audit::record(
                tx,
                EntityKind::Substitution,
                id.0,
                decision.audit_action(),
                actor,
                now,
            )?;
            Ok(request)
        });

        match &result {
            Ok(request) => info!(
                substitution_id = id.0,
                status = %request.status,
                actor,
                "substitution decided"
            ),
            Err(err) => warn!(
                substitution_id = id.0,
                kind = err.kind(),
                error = %err,
                "substitution decision failed"
            ),
        }
        result
    }

    pub fn get(&self, id: SubstitutionId) -> Result<SubstitutionRequest, SchedulingError> {
        self.store.read(|tx| load_substitution(tx, id))
    }

    /// Requests with the given status (all when `None`), newest first.
    pub fn list(
        &self,
        status: Option<SubstitutionStatus>,
    ) -> Result<Vec<SubstitutionRequest>, SchedulingError> {
        self.store
            .read(|tx| tx.substitutions(status).map_err(SchedulingError::from))
    }
}

fn approve(
    tx: &mut dyn StoreTx,
    policy: &SchedulingPolicy,
    request: &SubstitutionRequest,
    actor: &str,
    now: NaiveDateTime,
) -> Result<(), SchedulingError> {
    let original = load_assignment(tx, request.assignment_id)?;
    if original.status != AssignmentStatus::Active {
        return Err(SchedulingError::InvalidState(format!(
            "assignment {} is no longer active",
            original.id
        )));
    }
    cancel_in(tx, original.id, actor, now)?;

    let substitute = load_professional(tx, request.substitute_professional_id)?;
    let shift = load_shift(tx, original.shift_id)?;
    rules::ensure_assignable(tx, policy, &substitute, &shift, None)?;

    let replacement = tx.insert_assignment(substitute.id, shift.id, now)?;
    audit::record(
        tx,
        EntityKind::Assignment,
        replacement.id.0,
        AuditAction::Created,
        actor,
        now,
    )?;
    Ok(())
}

fn load_substitution(
    tx: &dyn StoreTx,
    id: SubstitutionId,
) -> Result<SubstitutionRequest, SchedulingError> {
    tx.substitution(id)?
        .ok_or_else(|| SchedulingError::not_found("substitution request", id.0))
}

/// Every active professional, ranked by weekly load then id, with a flag
/// for those whose bookings overlap `target`.
fn candidate_pool(tx: &dyn StoreTx, target: &Shift) -> Result<Vec<PoolEntry>, SchedulingError> {
    let week = IsoWeek::containing(target.date);
    let mut minutes: HashMap<ProfessionalId, i64> = HashMap::new();
    for booking in tx.active_bookings(&week.range(), None)? {
        *minutes.entry(booking.professional_id).or_default() += booking.shift.duration_minutes();
    }

    let nearby = tx.active_bookings(&DateRange::around(target.date), None)?;

    let mut pool: Vec<PoolEntry> = tx
        .professionals(true)?
        .into_iter()
        .map(|professional| {
            let blocked = overlaps_target(&nearby, professional.id, target);
            PoolEntry {
                candidate: SubstituteCandidate {
                    weekly_minutes: minutes.get(&professional.id).copied().unwrap_or(0),
                    professional_id: professional.id,
                    name: professional.name,
                    role: professional.role,
                },
                blocked,
            }
        })
        .collect();

    pool.sort_by_key(|entry| (entry.candidate.weekly_minutes, entry.candidate.professional_id));
    Ok(pool)
}

fn overlaps_target(bookings: &[Booking], professional_id: ProfessionalId, target: &Shift) -> bool {
    bookings
        .iter()
        .filter(|booking| booking.professional_id == professional_id)
        .any(|booking| booking.shift.overlaps(target))
}

/// A professional proposed as a replacement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstituteCandidate {
    pub professional_id: ProfessionalId,
    pub name: String,
    pub role: String,
    #[serde(rename = "weekly_hours", serialize_with = "serialize_hours")]
    pub weekly_minutes: i64,
}

#[derive(Debug, Clone)]
struct PoolEntry {
    candidate: SubstituteCandidate,
    blocked: bool,
}

/// Ranked suggestion set; each call to [`SubstituteSuggestions::iter`] starts
/// a fresh pass over the same snapshot.
#[derive(Debug, Clone)]
pub struct SubstituteSuggestions {
    pool: Vec<PoolEntry>,
    limit: usize,
}

impl SubstituteSuggestions {
    pub fn iter(&self) -> Suggestions<'_> {
        Suggestions {
            entries: self.pool.iter(),
            remaining: self.limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<'a> IntoIterator for &'a SubstituteSuggestions {
    type Item = &'a SubstituteCandidate;
    type IntoIter = Suggestions<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy pass over the pool that skips blocked professionals and stops after
/// `limit` candidates.
pub struct Suggestions<'a> {
    entries: std::slice::Iter<'a, PoolEntry>,
    remaining: usize,
}

impl<'a> Iterator for Suggestions<'a> {
    type Item = &'a SubstituteCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.entries.find(|entry| !entry.blocked)?;
        self.remaining -= 1;
        Some(&entry.candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining.min(self.entries.len())))
    }
}
