use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::error;

use super::domain::{AuditAction, AuditEntry, AuditEntryId, EntityKind, NewAuditEntry};
use super::error::SchedulingError;
use super::store::{AuditCount, AuditFilter, ScheduleStore, StoreTx};

/// Appends a trail entry inside the caller's transaction.
///
/// A failure is logged and returned, which rolls the surrounding change back.
pub fn record(
    tx: &mut dyn StoreTx,
    entity: EntityKind,
    entity_id: i64,
    action: AuditAction,
    actor: &str,
    at: NaiveDateTime,
) -> Result<AuditEntry, SchedulingError> {
    let entry = NewAuditEntry {
        entity,
        entity_id,
        action,
        actor: actor.to_string(),
        recorded_at: at,
    };

    tx.append_audit(&entry).map_err(|err| {
        error!(
            entity = %entity,
            entity_id,
            action = %action,
            actor,
            error = %err,
            "failed to write audit entry"
        );
        SchedulingError::from(err)
    })
}

/// Counts grouped by entity and action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub total_records: u64,
    pub distinct_entities: usize,
    pub breakdown: Vec<AuditCount>,
}

impl AuditSummary {
    fn from_counts(breakdown: Vec<AuditCount>) -> Self {
        let total_records = breakdown.iter().map(|count| count.total).sum();
        let distinct_entities = breakdown
            .iter()
            .map(|count| count.entity.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        Self {
            total_records,
            distinct_entities,
            breakdown,
        }
    }
}

/// Read side of the audit trail.
pub struct AuditService<S> {
    store: Arc<S>,
}

impl<S: ScheduleStore> AuditService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Entries matching `filter`, newest first.
    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, SchedulingError> {
        if filter.range.is_inverted() {
            return Err(SchedulingError::Validation(
                "'from' must not be after 'to'".to_string(),
            ));
        }
        self.store
            .read(|tx| tx.audit_entries(filter).map_err(SchedulingError::from))
    }

    pub fn get(&self, id: AuditEntryId) -> Result<AuditEntry, SchedulingError> {
        self.store.read(|tx| {
            tx.audit_entry(id)?
                .ok_or_else(|| SchedulingError::not_found("audit entry", id.0))
        })
    }

    pub fn summary(&self) -> Result<AuditSummary, SchedulingError> {
        let counts = self
            .store
            .read(|tx| tx.audit_counts().map_err(SchedulingError::from))?;
        Ok(AuditSummary::from_counts(counts))
    }
}
