//! Shift scheduling: professionals, shifts, assignments, substitutions and
//! the audit trail, backed by a transactional store.

pub mod assignments;
pub mod audit;
pub mod calendar;
pub mod dashboard;
pub mod domain;
pub mod error;
pub(crate) mod formats;
pub mod migrations;
pub mod policy;
pub mod registry;
pub mod router;
pub(crate) mod rules;
pub mod sqlite;
pub mod store;
pub mod substitutions;

#[cfg(test)]
mod tests;

pub use assignments::AssignmentService;
pub use audit::{AuditService, AuditSummary};
pub use calendar::{DateRange, IsoWeek};
pub use dashboard::{DashboardKpis, DashboardService, DashboardSummary, WorkloadEntry};
pub use domain::{
    actor_or_default, Assignment, AssignmentChanges, AssignmentId, AssignmentStatus,
    AssignmentView, AuditEntry, AuditEntryId, Decision, NewProfessional, NewShift,
    NewSubstitution, Professional, ProfessionalId, ProfessionalPatch, Shift, ShiftId, ShiftPatch,
    SubstitutionId, SubstitutionRequest, SubstitutionStatus, DEFAULT_ACTOR,
};
pub use error::SchedulingError;
pub use policy::{Clock, FixedClock, SchedulingPolicy, SystemClock};
pub use registry::RegistryService;
pub use router::{scheduling_router, SchedulingServices};
pub use sqlite::SqliteStore;
pub use store::{AssignmentFilter, AuditFilter, ScheduleStore, StoreError, StoreTx};
pub use substitutions::{
    SubstituteCandidate, SubstituteSuggestions, SubstitutionService, DEFAULT_SUGGESTION_LIMIT,
};
