//! Versioned schema migrations for the SQLite store.
//!
//! Applied versions are tracked in `schema_migrations`, so running the
//! migrator repeatedly is a no-op once the schema is current.

use rusqlite::{params, Connection};
use tracing::info;

use super::store::StoreError;

const MIGRATION_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);";

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "append_only_audit",
        sql: SCHEMA_V2,
    },
];

const SCHEMA_V1: &str = "\
CREATE TABLE professionals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE shifts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    function_id INTEGER NOT NULL,
    location_id INTEGER NOT NULL
);
CREATE INDEX idx_shifts_date ON shifts (date);

CREATE TABLE assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    professional_id INTEGER NOT NULL REFERENCES professionals (id),
    shift_id INTEGER NOT NULL REFERENCES shifts (id),
    status TEXT NOT NULL CHECK (status IN ('active', 'cancelled')),
    created_at TEXT NOT NULL
);
CREATE UNIQUE INDEX idx_assignments_one_active_per_shift
    ON assignments (shift_id) WHERE status = 'active';
CREATE INDEX idx_assignments_professional ON assignments (professional_id, status);

CREATE TABLE substitution_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    assignment_id INTEGER NOT NULL REFERENCES assignments (id),
    requesting_professional_id INTEGER NOT NULL REFERENCES professionals (id),
    substitute_professional_id INTEGER NOT NULL REFERENCES professionals (id),
    status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
    requested_at TEXT NOT NULL,
    reason TEXT,
    decided_at TEXT
);
CREATE INDEX idx_substitutions_status ON substitution_requests (status);

CREATE TABLE audit_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    action TEXT NOT NULL,
    actor TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE INDEX idx_audit_recorded_at ON audit_entries (recorded_at);
";

const SCHEMA_V2: &str = "\
CREATE TRIGGER audit_entries_no_update BEFORE UPDATE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit entries are append-only');
END;

CREATE TRIGGER audit_entries_no_delete BEFORE DELETE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit entries are append-only');
END;
";

/// Applies every pending migration, each in its own transaction.
///
/// Returns the number of migrations applied by this call.
pub fn run_migrations(conn: &mut Connection) -> Result<usize, StoreError> {
    conn.execute_batch(MIGRATION_TABLE_DDL)?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;

        info!(
            version = migration.version,
            name = migration.name,
            "applied schema migration"
        );
        applied += 1;
    }

    Ok(applied)
}

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().expect("in-memory db");
        assert_eq!(run_migrations(&mut conn).expect("first run"), MIGRATIONS.len());
        assert_eq!(run_migrations(&mut conn).expect("second run"), 0);

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .expect("version row");
        assert_eq!(version, latest_version());
    }

    #[test]
    fn audit_rows_cannot_be_rewritten() {
        let mut conn = Connection::open_in_memory().expect("in-memory db");
        run_migrations(&mut conn).expect("migrations");
        conn.execute(
            "INSERT INTO audit_entries (entity, entity_id, action, actor, recorded_at) \
             VALUES ('assignment', 1, 'created', 'system', '2025-07-01 08:00:00')",
            [],
        )
        .expect("insert audit row");

        assert!(conn
            .execute("UPDATE audit_entries SET actor = 'mallory'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM audit_entries", []).is_err());
    }
}
