use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::scheduling::calendar::DateRange;
use crate::scheduling::domain::{
    Assignment, AssignmentId, AssignmentView, AuditEntry, AuditEntryId, Booking, NewAuditEntry,
    NewProfessional, NewShift, NewSubstitution, Professional, ProfessionalId, Shift, ShiftId,
    SubstitutionId, SubstitutionRequest, SubstitutionStatus,
};
use crate::scheduling::store::{
    AssignmentFilter, AuditCount, AuditFilter, DailyCoverage, EntityCounts, ScheduleStore,
    StatusCount, StoreError, StoreTx,
};
use crate::scheduling::{
    FixedClock, SchedulingPolicy, SchedulingServices, SqliteStore, DEFAULT_ACTOR,
};

pub(super) fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
}

pub(super) fn time(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M").expect("valid time")
}

pub(super) fn at(day: &str, clock: &str) -> NaiveDateTime {
    date(day).and_time(time(clock))
}

/// A week before the 2025-07-01 scenarios, so lead time never interferes.
pub(super) fn default_now() -> NaiveDateTime {
    at("2025-06-20", "09:00")
}

pub(super) fn memory_store() -> Arc<SqliteStore> {
    let store = SqliteStore::open_in_memory().expect("in-memory store");
    store.migrate().expect("migrations apply");
    Arc::new(store)
}

pub(super) fn services_at<S: ScheduleStore>(
    store: Arc<S>,
    now: NaiveDateTime,
) -> SchedulingServices<S> {
    SchedulingServices::new(store, SchedulingPolicy::default(), Arc::new(FixedClock(now)))
}

pub(super) struct Fixture {
    pub(super) store: Arc<SqliteStore>,
    pub(super) services: SchedulingServices<SqliteStore>,
}

impl Fixture {
    pub(super) fn new() -> Self {
        Self::at(default_now())
    }

    pub(super) fn at(now: NaiveDateTime) -> Self {
        let store = memory_store();
        let services = services_at(Arc::clone(&store), now);
        Self { store, services }
    }

    /// Same database, different "now".
    pub(super) fn services_at(&self, now: NaiveDateTime) -> SchedulingServices<SqliteStore> {
        services_at(Arc::clone(&self.store), now)
    }

    pub(super) fn professional(&self, name: &str) -> Professional {
        self.services
            .registry
            .register_professional(
                NewProfessional {
                    name: name.to_string(),
                    role: "Enfermeiro".to_string(),
                    email: format!("{}@escala360.test", name.to_lowercase()),
                    phone: None,
                    active: true,
                },
                DEFAULT_ACTOR,
            )
            .expect("professional registers")
    }

    pub(super) fn shift(&self, day: &str, start: &str, end: &str) -> Shift {
        self.services
            .registry
            .create_shift(
                NewShift {
                    date: date(day),
                    start: time(start),
                    end: time(end),
                    function_id: 1,
                    location_id: 1,
                },
                DEFAULT_ACTOR,
            )
            .expect("shift is created")
    }

    pub(super) fn assign(&self, professional: &Professional, shift: &Shift) -> Assignment {
        self.services
            .assignments
            .create(professional.id, shift.id, DEFAULT_ACTOR)
            .expect("assignment is created")
    }

    /// Books `professional` for 36h in the week of 2025-06-30 using three
    /// 12h shifts outside 2025-07-01.
    pub(super) fn book_36_hours(&self, professional: &Professional) {
        for day in ["2025-06-30", "2025-07-02", "2025-07-03"] {
            let shift = self.shift(day, "07:00", "19:00");
            self.assign(professional, &shift);
        }
    }

    pub(super) fn audit_log(&self) -> Vec<AuditEntry> {
        self.services
            .audit
            .query(&AuditFilter::default())
            .expect("audit query")
    }

    pub(super) fn active_views(&self, shift: &Shift) -> Vec<AssignmentView> {
        self.services
            .assignments
            .list(&AssignmentFilter {
                shift_id: Some(shift.id),
                status: Some(crate::scheduling::AssignmentStatus::Active),
                ..AssignmentFilter::default()
            })
            .expect("list assignments")
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Store wrapper that can make assignment inserts fail mid-transaction.
pub(super) struct FaultyStore {
    inner: Arc<SqliteStore>,
    armed: AtomicBool,
}

impl FaultyStore {
    pub(super) fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
        }
    }

    pub(super) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl ScheduleStore for FaultyStore {
    fn write<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
    {
        let armed = self.armed.load(Ordering::SeqCst);
        self.inner
            .write(|tx| work(&mut FaultyTx { inner: tx, armed }))
    }

    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn StoreTx) -> Result<T, E>,
    {
        self.inner.read(work)
    }
}

struct FaultyTx<'a> {
    inner: &'a mut dyn StoreTx,
    armed: bool,
}

impl StoreTx for FaultyTx<'_> {
    fn insert_professional(&mut self, new: &NewProfessional) -> Result<Professional, StoreError> {
        self.inner.insert_professional(new)
    }

    fn update_professional(&mut self, professional: &Professional) -> Result<(), StoreError> {
        self.inner.update_professional(professional)
    }

    fn professional(&self, id: ProfessionalId) -> Result<Option<Professional>, StoreError> {
        self.inner.professional(id)
    }

    fn professional_by_email(&self, email: &str) -> Result<Option<Professional>, StoreError> {
        self.inner.professional_by_email(email)
    }

    fn professionals(&self, active_only: bool) -> Result<Vec<Professional>, StoreError> {
        self.inner.professionals(active_only)
    }

    fn insert_shift(&mut self, new: &NewShift) -> Result<Shift, StoreError> {
        self.inner.insert_shift(new)
    }

    fn update_shift(&mut self, shift: &Shift) -> Result<(), StoreError> {
        self.inner.update_shift(shift)
    }

    fn shift(&self, id: ShiftId) -> Result<Option<Shift>, StoreError> {
        self.inner.shift(id)
    }

    fn shifts(&self, range: &DateRange) -> Result<Vec<Shift>, StoreError> {
        self.inner.shifts(range)
    }

    fn matching_shift(&self, new: &NewShift) -> Result<Option<Shift>, StoreError> {
        self.inner.matching_shift(new)
    }

    fn insert_assignment(
        &mut self,
        professional_id: ProfessionalId,
        shift_id: ShiftId,
        created_at: NaiveDateTime,
    ) -> Result<Assignment, StoreError> {
        if self.armed {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner
            .insert_assignment(professional_id, shift_id, created_at)
    }

    fn update_assignment(&mut self, assignment: &Assignment) -> Result<(), StoreError> {
        self.inner.update_assignment(assignment)
    }

    fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StoreError> {
        self.inner.assignment(id)
    }

    fn active_assignment_for_shift(
        &self,
        shift_id: ShiftId,
    ) -> Result<Option<Assignment>, StoreError> {
        self.inner.active_assignment_for_shift(shift_id)
    }

    fn assignment_views(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<AssignmentView>, StoreError> {
        self.inner.assignment_views(filter)
    }

    fn active_bookings(
        &self,
        range: &DateRange,
        professional_id: Option<ProfessionalId>,
    ) -> Result<Vec<Booking>, StoreError> {
        self.inner.active_bookings(range, professional_id)
    }

    fn insert_substitution(
        &mut self,
        new: &NewSubstitution,
        requested_at: NaiveDateTime,
    ) -> Result<SubstitutionRequest, StoreError> {
        self.inner.insert_substitution(new, requested_at)
    }

    fn update_substitution(&mut self, request: &SubstitutionRequest) -> Result<(), StoreError> {
        self.inner.update_substitution(request)
    }

    fn substitution(&self, id: SubstitutionId) -> Result<Option<SubstitutionRequest>, StoreError> {
        self.inner.substitution(id)
    }

    fn substitutions(
        &self,
        status: Option<SubstitutionStatus>,
    ) -> Result<Vec<SubstitutionRequest>, StoreError> {
        self.inner.substitutions(status)
    }

    fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<AuditEntry, StoreError> {
        self.inner.append_audit(entry)
    }

    fn audit_entry(&self, id: AuditEntryId) -> Result<Option<AuditEntry>, StoreError> {
        self.inner.audit_entry(id)
    }

    fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        self.inner.audit_entries(filter)
    }

    fn audit_counts(&self) -> Result<Vec<AuditCount>, StoreError> {
        self.inner.audit_counts()
    }

    fn entity_counts(&self, range: &DateRange) -> Result<EntityCounts, StoreError> {
        self.inner.entity_counts(range)
    }

    fn daily_coverage(&self, range: &DateRange) -> Result<Vec<DailyCoverage>, StoreError> {
        self.inner.daily_coverage(range)
    }

    fn substitution_counts(&self) -> Result<Vec<StatusCount>, StoreError> {
        self.inner.substitution_counts()
    }
}

pub(super) fn substitution(
    assignment: &Assignment,
    requester: &Professional,
    substitute: &Professional,
) -> NewSubstitution {
    NewSubstitution {
        assignment_id: assignment.id,
        requesting_professional_id: requester.id,
        substitute_professional_id: substitute.id,
        reason: Some("consulta médica".to_string()),
    }
}
