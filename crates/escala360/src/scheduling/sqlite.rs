use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{
    named_params, params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior,
};
use tracing::{debug, info, warn};

use super::calendar::DateRange;
use super::domain::{
    Assignment, AssignmentId, AssignmentStatus, AssignmentView, AuditEntry, AuditEntryId,
    Booking, NewAuditEntry, NewProfessional, NewShift, NewSubstitution, Professional,
    ProfessionalId, Shift, ShiftId, SubstitutionId, SubstitutionRequest, SubstitutionStatus,
};
use super::migrations::run_migrations;
use super::store::{
    AssignmentFilter, AuditCount, AuditFilter, DailyCoverage, EntityCounts, ScheduleStore,
    StatusCount, StoreError, StoreTx,
};

const BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// SQLite-backed [`ScheduleStore`].
///
/// Writes go through one connection and start with `BEGIN IMMEDIATE`, so the
/// write lock is held from the first read of a check-then-write sequence
/// until commit. File databases run in WAL mode with a second, query-only
/// connection for reads, which see the last committed snapshot and never wait
/// on a writer. An in-memory database is private to its connection, so there
/// reads share the writer.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let writer = Connection::open(path)?;
        let mode: String =
            writer.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened sqlite database");

        let reader = configure(Connection::open(path)?)?;
        reader.pragma_update(None, "query_only", true)?;

        Ok(Self {
            writer: Mutex::new(configure(writer)?),
            reader: Some(Mutex::new(reader)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            writer: Mutex::new(configure(Connection::open_in_memory()?)?),
            reader: None,
        })
    }

    /// Opens `location`, treating `:memory:` as a private in-memory database.
    pub fn open_location(location: &str) -> Result<Self, StoreError> {
        if location.trim() == ":memory:" {
            Self::open_in_memory()
        } else {
            Self::open(location)
        }
    }

    /// Runs pending schema migrations; returns how many were applied.
    pub fn migrate(&self) -> Result<usize, StoreError> {
        let mut conn = recover(&self.writer);
        let applied = run_migrations(&mut conn)?;
        info!(applied, "schema is up to date");
        Ok(applied)
    }

    fn read_connection(&self) -> MutexGuard<'_, Connection> {
        recover(self.reader.as_ref().unwrap_or(&self.writer))
    }
}

fn configure(conn: Connection) -> Result<Connection, StoreError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Locks `conn`, taking it back from a request that panicked while holding it.
///
/// Unwinding drops the open transaction, which rolls it back; any transaction
/// still open afterwards is rolled back here before the connection is reused.
fn recover(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| {
        warn!("recovering sqlite connection after a panicked request");
        conn.clear_poison();
        let guard = poisoned.into_inner();
        if !guard.is_autocommit() {
            if let Err(err) = guard.execute_batch("ROLLBACK") {
                warn!(error = %err, "rollback of abandoned transaction failed");
            }
        }
        guard
    })
}

impl ScheduleStore for SqliteStore {
    fn write<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
    {
        let mut conn = recover(&self.writer);
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        match work(&mut SqliteTx { conn: &tx }) {
            Ok(value) => {
                tx.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                debug!("write transaction rolled back");
                Err(err)
            }
        }
    }

    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn StoreTx) -> Result<T, E>,
    {
        let mut conn = self.read_connection();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(StoreError::from)?;
        // Read-only; dropping the transaction rolls it back.
        work(&SqliteTx { conn: &tx })
    }
}

struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl StoreTx for SqliteTx<'_> {
    fn insert_professional(&mut self, new: &NewProfessional) -> Result<Professional, StoreError> {
        self.conn
            .execute(
                "INSERT INTO professionals (name, role, email, phone, active) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![new.name, new.role, new.email, new.phone, new.active],
            )
            .map_err(|err| duplicate_email(err, &new.email))?;

        Ok(Professional {
            id: ProfessionalId(self.conn.last_insert_rowid()),
            name: new.name.clone(),
            role: new.role.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            active: new.active,
        })
    }

    fn update_professional(&mut self, professional: &Professional) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE professionals \
                 SET name = ?2, role = ?3, email = ?4, phone = ?5, active = ?6 \
                 WHERE id = ?1",
                params![
                    professional.id.0,
                    professional.name,
                    professional.role,
                    professional.email,
                    professional.phone,
                    professional.active
                ],
            )
            .map_err(|err| duplicate_email(err, &professional.email))?;
        expect_row(changed, "professional", professional.id.0)
    }

    fn professional(&self, id: ProfessionalId) -> Result<Option<Professional>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, role, email, phone, active FROM professionals WHERE id = ?1",
                [id.0],
                professional_from_row,
            )
            .optional()?)
    }

    fn professional_by_email(&self, email: &str) -> Result<Option<Professional>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, role, email, phone, active FROM professionals \
                 WHERE email = ?1 COLLATE NOCASE",
                [email],
                professional_from_row,
            )
            .optional()?)
    }

    fn professionals(&self, active_only: bool) -> Result<Vec<Professional>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, role, email, phone, active FROM professionals \
             WHERE (?1 = 0 OR active = 1) ORDER BY name, id",
        )?;
        let rows = stmt.query_map([active_only], professional_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_shift(&mut self, new: &NewShift) -> Result<Shift, StoreError> {
        self.conn.execute(
            "INSERT INTO shifts (date, start_time, end_time, function_id, location_id) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new.date, new.start, new.end, new.function_id, new.location_id],
        )?;

        Ok(Shift {
            id: ShiftId(self.conn.last_insert_rowid()),
            date: new.date,
            start: new.start,
            end: new.end,
            function_id: new.function_id,
            location_id: new.location_id,
        })
    }

    fn update_shift(&mut self, shift: &Shift) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE shifts SET date = ?2, start_time = ?3, end_time = ?4, function_id = ?5, \
             location_id = ?6 WHERE id = ?1",
            params![
                shift.id.0,
                shift.date,
                shift.start,
                shift.end,
                shift.function_id,
                shift.location_id
            ],
        )?;
        expect_row(changed, "shift", shift.id.0)
    }

    fn shift(&self, id: ShiftId) -> Result<Option<Shift>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, date, start_time, end_time, function_id, location_id \
                 FROM shifts WHERE id = ?1",
                [id.0],
                shift_from_row,
            )
            .optional()?)
    }

    fn shifts(&self, range: &DateRange) -> Result<Vec<Shift>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, start_time, end_time, function_id, location_id FROM shifts \
             WHERE (:from IS NULL OR date >= :from) AND (:to IS NULL OR date <= :to) \
             ORDER BY date, start_time, id",
        )?;
        let rows = stmt.query_map(
            named_params! { ":from": range.from, ":to": range.to },
            shift_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn matching_shift(&self, new: &NewShift) -> Result<Option<Shift>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, date, start_time, end_time, function_id, location_id FROM shifts \
                 WHERE date = ?1 AND start_time = ?2 AND end_time = ?3 \
                 AND function_id = ?4 AND location_id = ?5 ORDER BY id LIMIT 1",
                params![new.date, new.start, new.end, new.function_id, new.location_id],
                shift_from_row,
            )
            .optional()?)
    }

    fn insert_assignment(
        &mut self,
        professional_id: ProfessionalId,
        shift_id: ShiftId,
        created_at: NaiveDateTime,
    ) -> Result<Assignment, StoreError> {
        let status = AssignmentStatus::Active;
        self.conn
            .execute(
                "INSERT INTO assignments (professional_id, shift_id, status, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![professional_id.0, shift_id.0, status, created_at],
            )
            .map_err(|err| shift_taken(err, shift_id))?;

        Ok(Assignment {
            id: AssignmentId(self.conn.last_insert_rowid()),
            professional_id,
            shift_id,
            status,
            created_at,
        })
    }

    fn update_assignment(&mut self, assignment: &Assignment) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE assignments SET professional_id = ?2, shift_id = ?3, status = ?4 \
                 WHERE id = ?1",
                params![
                    assignment.id.0,
                    assignment.professional_id.0,
                    assignment.shift_id.0,
                    assignment.status
                ],
            )
            .map_err(|err| shift_taken(err, assignment.shift_id))?;
        expect_row(changed, "assignment", assignment.id.0)
    }

    fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, professional_id, shift_id, status, created_at \
                 FROM assignments WHERE id = ?1",
                [id.0],
                assignment_from_row,
            )
            .optional()?)
    }

    fn active_assignment_for_shift(
        &self,
        shift_id: ShiftId,
    ) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, professional_id, shift_id, status, created_at FROM assignments \
                 WHERE shift_id = ?1 AND status = 'active'",
                [shift_id.0],
                assignment_from_row,
            )
            .optional()?)
    }

    fn assignment_views(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<AssignmentView>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.professional_id, p.name AS professional_name, a.shift_id, \
                    s.date, s.start_time, s.end_time, a.status, a.created_at \
             FROM assignments a \
             JOIN professionals p ON p.id = a.professional_id \
             JOIN shifts s ON s.id = a.shift_id \
             WHERE (:professional_id IS NULL OR a.professional_id = :professional_id) \
               AND (:shift_id IS NULL OR a.shift_id = :shift_id) \
               AND (:status IS NULL OR a.status = :status) \
               AND (:from IS NULL OR s.date >= :from) \
               AND (:to IS NULL OR s.date <= :to) \
             ORDER BY s.date, s.start_time, a.id",
        )?;
        let rows = stmt.query_map(
            named_params! {
                ":professional_id": filter.professional_id.map(|id| id.0),
                ":shift_id": filter.shift_id.map(|id| id.0),
                ":status": filter.status,
                ":from": filter.range.from,
                ":to": filter.range.to,
            },
            |row| {
                Ok(AssignmentView {
                    id: AssignmentId(row.get("id")?),
                    professional_id: ProfessionalId(row.get("professional_id")?),
                    professional_name: row.get("professional_name")?,
                    shift_id: ShiftId(row.get("shift_id")?),
                    shift_date: row.get("date")?,
                    start: row.get("start_time")?,
                    end: row.get("end_time")?,
                    status: row.get("status")?,
                    created_at: row.get("created_at")?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn active_bookings(
        &self,
        range: &DateRange,
        professional_id: Option<ProfessionalId>,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id AS assignment_id, a.professional_id, s.id AS id, s.date, \
                    s.start_time, s.end_time, s.function_id, s.location_id \
             FROM assignments a JOIN shifts s ON s.id = a.shift_id \
             WHERE a.status = 'active' \
               AND (:professional_id IS NULL OR a.professional_id = :professional_id) \
               AND (:from IS NULL OR s.date >= :from) \
               AND (:to IS NULL OR s.date <= :to) \
             ORDER BY s.date, s.start_time, a.id",
        )?;
        let rows = stmt.query_map(
            named_params! {
                ":professional_id": professional_id.map(|id| id.0),
                ":from": range.from,
                ":to": range.to,
            },
            |row| {
                Ok(Booking {
                    assignment_id: AssignmentId(row.get("assignment_id")?),
                    professional_id: ProfessionalId(row.get("professional_id")?),
                    shift: shift_from_row(row)?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_substitution(
        &mut self,
        new: &NewSubstitution,
        requested_at: NaiveDateTime,
    ) -> Result<SubstitutionRequest, StoreError> {
        let status = SubstitutionStatus::Pending;
        self.conn.execute(
            "INSERT INTO substitution_requests (assignment_id, requesting_professional_id, \
             substitute_professional_id, status, requested_at, reason) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.assignment_id.0,
                new.requesting_professional_id.0,
                new.substitute_professional_id.0,
                status,
                requested_at,
                new.reason
            ],
        )?;

        Ok(SubstitutionRequest {
            id: SubstitutionId(self.conn.last_insert_rowid()),
            assignment_id: new.assignment_id,
            requesting_professional_id: new.requesting_professional_id,
            substitute_professional_id: new.substitute_professional_id,
            status,
            requested_at,
            reason: new.reason.clone(),
            decided_at: None,
        })
    }

    fn update_substitution(&mut self, request: &SubstitutionRequest) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE substitution_requests SET substitute_professional_id = ?2, status = ?3, \
             reason = ?4, decided_at = ?5 WHERE id = ?1",
            params![
                request.id.0,
                request.substitute_professional_id.0,
                request.status,
                request.reason,
                request.decided_at
            ],
        )?;
        expect_row(changed, "substitution request", request.id.0)
    }

    fn substitution(&self, id: SubstitutionId) -> Result<Option<SubstitutionRequest>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, assignment_id, requesting_professional_id, substitute_professional_id, \
                        status, requested_at, reason, decided_at \
                 FROM substitution_requests WHERE id = ?1",
                [id.0],
                substitution_from_row,
            )
            .optional()?)
    }

    fn substitutions(
        &self,
        status: Option<SubstitutionStatus>,
    ) -> Result<Vec<SubstitutionRequest>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, assignment_id, requesting_professional_id, substitute_professional_id, \
                    status, requested_at, reason, decided_at \
             FROM substitution_requests \
             WHERE (:status IS NULL OR status = :status) \
             ORDER BY requested_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(named_params! { ":status": status }, substitution_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<AuditEntry, StoreError> {
        self.conn.execute(
            "INSERT INTO audit_entries (entity, entity_id, action, actor, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.entity.as_str(),
                entry.entity_id,
                entry.action.as_str(),
                entry.actor,
                entry.recorded_at
            ],
        )?;

        Ok(AuditEntry {
            id: AuditEntryId(self.conn.last_insert_rowid()),
            entity: entry.entity.as_str().to_string(),
            entity_id: entry.entity_id,
            action: entry.action.as_str().to_string(),
            actor: entry.actor.clone(),
            recorded_at: entry.recorded_at,
        })
    }

    fn audit_entry(&self, id: AuditEntryId) -> Result<Option<AuditEntry>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, entity, entity_id, action, actor, recorded_at \
                 FROM audit_entries WHERE id = ?1",
                [id.0],
                audit_from_row,
            )
            .optional()?)
    }

    fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let from = filter.range.from.and_then(|date| date.and_hms_opt(0, 0, 0));
        let until = filter
            .range
            .to
            .and_then(|date| date.succ_opt())
            .and_then(|date| date.and_hms_opt(0, 0, 0));

        let mut stmt = self.conn.prepare(
            "SELECT id, entity, entity_id, action, actor, recorded_at FROM audit_entries \
             WHERE (:entity IS NULL OR entity LIKE :entity ESCAPE '\\') \
               AND (:actor IS NULL OR actor LIKE :actor ESCAPE '\\') \
               AND (:from IS NULL OR recorded_at >= :from) \
               AND (:until IS NULL OR recorded_at < :until) \
             ORDER BY recorded_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(
            named_params! {
                ":entity": filter.entity.as_deref().map(contains_pattern),
                ":actor": filter.actor.as_deref().map(contains_pattern),
                ":from": from,
                ":until": until,
            },
            audit_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn audit_counts(&self) -> Result<Vec<AuditCount>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT entity, action, COUNT(*) AS total FROM audit_entries \
             GROUP BY entity, action ORDER BY entity, action",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AuditCount {
                entity: row.get("entity")?,
                action: row.get("action")?,
                total: count(row, "total")?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn entity_counts(&self, range: &DateRange) -> Result<EntityCounts, StoreError> {
        Ok(self.conn.query_row(
            "SELECT \
               (SELECT COUNT(*) FROM professionals) AS professionals, \
               (SELECT COUNT(*) FROM professionals WHERE active = 1) AS active_professionals, \
               (SELECT COUNT(*) FROM shifts s \
                 WHERE (:from IS NULL OR s.date >= :from) AND (:to IS NULL OR s.date <= :to)) \
                 AS shifts, \
               (SELECT COUNT(DISTINCT a.shift_id) FROM assignments a \
                 JOIN shifts s ON s.id = a.shift_id WHERE a.status = 'active' \
                 AND (:from IS NULL OR s.date >= :from) AND (:to IS NULL OR s.date <= :to)) \
                 AS covered_shifts, \
               (SELECT COUNT(*) FROM assignments a \
                 JOIN shifts s ON s.id = a.shift_id WHERE a.status = 'active' \
                 AND (:from IS NULL OR s.date >= :from) AND (:to IS NULL OR s.date <= :to)) \
                 AS active_assignments, \
               (SELECT COUNT(*) FROM assignments a \
                 JOIN shifts s ON s.id = a.shift_id WHERE a.status = 'cancelled' \
                 AND (:from IS NULL OR s.date >= :from) AND (:to IS NULL OR s.date <= :to)) \
                 AS cancelled_assignments",
            named_params! { ":from": range.from, ":to": range.to },
            |row| {
                Ok(EntityCounts {
                    professionals: count(row, "professionals")?,
                    active_professionals: count(row, "active_professionals")?,
                    shifts: count(row, "shifts")?,
                    covered_shifts: count(row, "covered_shifts")?,
                    active_assignments: count(row, "active_assignments")?,
                    cancelled_assignments: count(row, "cancelled_assignments")?,
                })
            },
        )?)
    }

    fn daily_coverage(&self, range: &DateRange) -> Result<Vec<DailyCoverage>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.date, COUNT(s.id) AS shifts, COUNT(a.id) AS covered \
             FROM shifts s \
             LEFT JOIN assignments a ON a.shift_id = s.id AND a.status = 'active' \
             WHERE (:from IS NULL OR s.date >= :from) AND (:to IS NULL OR s.date <= :to) \
             GROUP BY s.date ORDER BY s.date",
        )?;
        let rows = stmt.query_map(
            named_params! { ":from": range.from, ":to": range.to },
            |row| {
                Ok(DailyCoverage {
                    date: row.get("date")?,
                    shifts: count(row, "shifts")?,
                    covered: count(row, "covered")?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn substitution_counts(&self) -> Result<Vec<StatusCount>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) AS total FROM substitution_requests \
             GROUP BY status ORDER BY status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StatusCount {
                status: row.get("status")?,
                total: count(row, "total")?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn professional_from_row(row: &Row<'_>) -> rusqlite::Result<Professional> {
    Ok(Professional {
        id: ProfessionalId(row.get("id")?),
        name: row.get("name")?,
        role: row.get("role")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        active: row.get("active")?,
    })
}

fn shift_from_row(row: &Row<'_>) -> rusqlite::Result<Shift> {
    Ok(Shift {
        id: ShiftId(row.get("id")?),
        date: row.get("date")?,
        start: row.get("start_time")?,
        end: row.get("end_time")?,
        function_id: row.get("function_id")?,
        location_id: row.get("location_id")?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: AssignmentId(row.get("id")?),
        professional_id: ProfessionalId(row.get("professional_id")?),
        shift_id: ShiftId(row.get("shift_id")?),
        status: row.get("status")?,
        created_at: row.get("created_at")?,
    })
}

fn substitution_from_row(row: &Row<'_>) -> rusqlite::Result<SubstitutionRequest> {
    Ok(SubstitutionRequest {
        id: SubstitutionId(row.get("id")?),
        assignment_id: AssignmentId(row.get("assignment_id")?),
        requesting_professional_id: ProfessionalId(row.get("requesting_professional_id")?),
        substitute_professional_id: ProfessionalId(row.get("substitute_professional_id")?),
        status: row.get("status")?,
        requested_at: row.get("requested_at")?,
        reason: row.get("reason")?,
        decided_at: row.get("decided_at")?,
    })
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: AuditEntryId(row.get("id")?),
        entity: row.get("entity")?,
        entity_id: row.get("entity_id")?,
        action: row.get("action")?,
        actor: row.get("actor")?,
        recorded_at: row.get("recorded_at")?,
    })
}

/// `LIKE` pattern matching `needle` literally anywhere in the column.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn count(row: &Row<'_>, column: &str) -> rusqlite::Result<u64> {
    let value: i64 = row.get(column)?;
    Ok(u64::try_from(value).unwrap_or_default())
}

fn expect_row(changed: usize, entity: &str, id: i64) -> Result<(), StoreError> {
    if changed == 0 {
        Err(StoreError::Missing(format!("{entity} {id}")))
    } else {
        Ok(())
    }
}

fn duplicate_email(err: rusqlite::Error, email: &str) -> StoreError {
    match StoreError::from(err) {
        StoreError::Constraint(_) => {
            StoreError::Constraint(format!("email {email} is already registered"))
        }
        other => other,
    }
}

fn shift_taken(err: rusqlite::Error, shift_id: ShiftId) -> StoreError {
    match StoreError::from(err) {
        StoreError::Constraint(_) => {
            StoreError::Constraint(format!("shift {shift_id} already has an active assignment"))
        }
        other => other,
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(message.unwrap_or_else(|| failure.to_string()))
            }
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                Self::Corrupt(format!("column {column}: {source}"))
            }
            other => Self::Sqlite(other),
        }
    }
}

impl ToSql for AssignmentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AssignmentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for SubstitutionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SubstitutionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}
