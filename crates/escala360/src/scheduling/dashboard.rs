use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::calendar::DateRange;
use super::domain::{Booking, Professional, ProfessionalId};
use super::error::SchedulingError;
use super::formats::serialize_hours;
use super::store::{DailyCoverage, EntityCounts, ScheduleStore, StatusCount};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardKpis {
    #[serde(flatten)]
    pub counts: EntityCounts,
    pub open_shifts: u64,
    pub coverage_percent: f64,
}

impl DashboardKpis {
    fn from_counts(counts: EntityCounts) -> Self {
        let open_shifts = counts.shifts.saturating_sub(counts.covered_shifts);
        let coverage_percent = if counts.shifts == 0 {
            0.0
        } else {
            (counts.covered_shifts as f64 / counts.shifts as f64 * 1000.0).round() / 10.0
        };
        Self {
            counts,
            open_shifts,
            coverage_percent,
        }
    }
}

/// Booked hours per professional within the dashboard window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadEntry {
    pub professional_id: ProfessionalId,
    pub name: String,
    pub shifts: u64,
    #[serde(rename = "hours", serialize_with = "serialize_hours")]
    pub minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub kpis: DashboardKpis,
    pub substitutions: Vec<StatusCount>,
    pub daily: Vec<DailyCoverage>,
    pub workload: Vec<WorkloadEntry>,
}

/// Read-only aggregates for the dashboard UI.
pub struct DashboardService<S> {
    store: Arc<S>,
}

impl<S: ScheduleStore> DashboardService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn summary(&self, range: &DateRange) -> Result<DashboardSummary, SchedulingError> {
        if range.is_inverted() {
            return Err(SchedulingError::Validation(
                "'from' must not be after 'to'".to_string(),
            ));
        }

        self.store.read(|tx| {
            let counts = tx.entity_counts(range)?;
            let bookings = tx.active_bookings(range, None)?;
            let professionals = tx.professionals(false)?;
            Ok(DashboardSummary {
                kpis: DashboardKpis::from_counts(counts),
                substitutions: tx.substitution_counts()?,
                daily: tx.daily_coverage(range)?,
                workload: workload(&bookings, &professionals),
            })
        })
    }
}

/// Heaviest load first, ties by professional id.
fn workload(bookings: &[Booking], professionals: &[Professional]) -> Vec<WorkloadEntry> {
    let mut totals: BTreeMap<ProfessionalId, (u64, i64)> = BTreeMap::new();
    for booking in bookings {
        let slot = totals.entry(booking.professional_id).or_default();
        slot.0 += 1;
        slot.1 += booking.shift.duration_minutes();
    }

    let names: BTreeMap<ProfessionalId, &str> = professionals
        .iter()
        .map(|professional| (professional.id, professional.name.as_str()))
        .collect();

    let mut entries: Vec<WorkloadEntry> = totals
        .into_iter()
        .map(|(professional_id, (shifts, minutes))| WorkloadEntry {
            professional_id,
            name: names
                .get(&professional_id)
                .map(|name| name.to_string())
                .unwrap_or_default(),
            shifts,
            minutes,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.minutes
            .cmp(&a.minutes)
            .then(a.professional_id.cmp(&b.professional_id))
    });
    entries
}
