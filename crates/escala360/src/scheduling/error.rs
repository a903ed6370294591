use chrono::{NaiveDate, NaiveDateTime};

use super::domain::ProfessionalId;
use super::store::StoreError;

/// Failure surfaced by the scheduling services.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{0}")]
    Conflict(String),
    #[error(
        "professional {professional_id} would reach {projected_hours}h in the week of \
         {week_start}, above the {cap_hours}h cap"
    )]
    CapacityExceeded {
        professional_id: ProfessionalId,
        week_start: NaiveDate,
        projected_hours: f64,
        cap_hours: u32,
    },
    #[error(
        "substitutions must be requested at least {lead_hours}h before the shift starts \
         ({shift_start}); requested at {requested_at}"
    )]
    LeadTimeViolation {
        shift_start: NaiveDateTime,
        requested_at: NaiveDateTime,
        lead_hours: u32,
    },
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(StoreError),
}

impl SchedulingError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Stable machine-readable name of the error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::LeadTimeViolation { .. } => "lead_time_violation",
            Self::InvalidState(_) => "invalid_state",
            Self::Validation(_) => "validation_error",
            Self::Store(_) => "storage_error",
        }
    }
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Constraint(message) => Self::Conflict(message),
            other => Self::Store(other),
        }
    }
}
