use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::calendar::DateRange;
use super::domain::{
    Assignment, AssignmentId, AssignmentStatus, AssignmentView, AuditEntry, AuditEntryId,
    Booking, NewAuditEntry, NewProfessional, NewShift, NewSubstitution, Professional,
    ProfessionalId, Shift, ShiftId, SubstitutionId, SubstitutionRequest, SubstitutionStatus,
};

/// Persistence boundary for the scheduling services.
///
/// Every read-check-write sequence runs inside one [`ScheduleStore::write`]
/// call: the closure's `Err` rolls the transaction back, `Ok` commits it.
pub trait ScheduleStore: Send + Sync {
    fn write<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>;

    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn StoreTx) -> Result<T, E>;
}

/// Operations available inside a store transaction.
pub trait StoreTx {
    fn insert_professional(&mut self, new: &NewProfessional) -> Result<Professional, StoreError>;
    fn update_professional(&mut self, professional: &Professional) -> Result<(), StoreError>;
    fn professional(&self, id: ProfessionalId) -> Result<Option<Professional>, StoreError>;
    fn professional_by_email(&self, email: &str) -> Result<Option<Professional>, StoreError>;
    fn professionals(&self, active_only: bool) -> Result<Vec<Professional>, StoreError>;

    fn insert_shift(&mut self, new: &NewShift) -> Result<Shift, StoreError>;
    fn update_shift(&mut self, shift: &Shift) -> Result<(), StoreError>;
    fn shift(&self, id: ShiftId) -> Result<Option<Shift>, StoreError>;
    fn shifts(&self, range: &DateRange) -> Result<Vec<Shift>, StoreError>;
    /// Finds a shift with exactly the same date, times, function and location.
    fn matching_shift(&self, new: &NewShift) -> Result<Option<Shift>, StoreError>;

    fn insert_assignment(
        &mut self,
        professional_id: ProfessionalId,
        shift_id: ShiftId,
        created_at: NaiveDateTime,
    ) -> Result<Assignment, StoreError>;
    fn update_assignment(&mut self, assignment: &Assignment) -> Result<(), StoreError>;
    fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StoreError>;
    fn active_assignment_for_shift(&self, shift_id: ShiftId)
        -> Result<Option<Assignment>, StoreError>;
    fn assignment_views(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<AssignmentView>, StoreError>;
    /// Active assignments whose shift date falls in `range`.
    fn active_bookings(
        &self,
        range: &DateRange,
        professional_id: Option<ProfessionalId>,
    ) -> Result<Vec<Booking>, StoreError>;

    fn insert_substitution(
        &mut self,
        new: &NewSubstitution,
        requested_at: NaiveDateTime,
    ) -> Result<SubstitutionRequest, StoreError>;
    fn update_substitution(&mut self, request: &SubstitutionRequest) -> Result<(), StoreError>;
    fn substitution(&self, id: SubstitutionId) -> Result<Option<SubstitutionRequest>, StoreError>;
    fn substitutions(
        &self,
        status: Option<SubstitutionStatus>,
    ) -> Result<Vec<SubstitutionRequest>, StoreError>;

    fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<AuditEntry, StoreError>;
    fn audit_entry(&self, id: AuditEntryId) -> Result<Option<AuditEntry>, StoreError>;
    fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError>;
    fn audit_counts(&self) -> Result<Vec<AuditCount>, StoreError>;

    fn entity_counts(&self, range: &DateRange) -> Result<EntityCounts, StoreError>;
    fn daily_coverage(&self, range: &DateRange) -> Result<Vec<DailyCoverage>, StoreError>;
    fn substitution_counts(&self) -> Result<Vec<StatusCount>, StoreError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("row missing: {0}")]
    Missing(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentFilter {
    pub professional_id: Option<ProfessionalId>,
    pub shift_id: Option<ShiftId>,
    pub status: Option<AssignmentStatus>,
    pub range: DateRange,
}

/// Audit query; `entity` and `actor` match case-insensitive substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub entity: Option<String>,
    pub actor: Option<String>,
    pub range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditCount {
    pub entity: String,
    pub action: String,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub professionals: u64,
    pub active_professionals: u64,
    pub shifts: u64,
    pub covered_shifts: u64,
    pub active_assignments: u64,
    pub cancelled_assignments: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCoverage {
    pub date: NaiveDate,
    pub shifts: u64,
    pub covered: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub total: u64,
}
