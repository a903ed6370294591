use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::formats;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered professional.
    ProfessionalId
);
entity_id!(
    /// Identifier of a shift ("plantão").
    ShiftId
);
entity_id!(
    /// Identifier of a professional-to-shift assignment.
    AssignmentId
);
entity_id!(SubstitutionId);
entity_id!(AuditEntryId);

/// A member of staff who can be placed on shifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Professional {
    pub id: ProfessionalId,
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: Option<String>,
    pub active: bool,
}

/// Registration payload for a professional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfessional {
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: Option<String>,
    pub active: bool,
}

/// Partial edit of a professional; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfessionalPatch {
    pub name: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

impl ProfessionalPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.role.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.active.is_none()
    }
}

/// A bounded working interval on a given date.
///
/// An end time earlier than the start time means the shift runs past
/// midnight and ends on the following day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub date: NaiveDate,
    #[serde(with = "formats::hhmm")]
    pub start: NaiveTime,
    #[serde(with = "formats::hhmm")]
    pub end: NaiveTime,
    pub function_id: i64,
    pub location_id: i64,
}

impl Shift {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    /// Saturates at `NaiveDateTime::MAX` for shifts on the last calendar day.
    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at()
            .checked_add_signed(self.duration())
            .unwrap_or(NaiveDateTime::MAX)
    }

    pub fn duration(&self) -> Duration {
        shift_duration(self.start, self.end)
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }

    /// Half-open interval overlap on absolute date-times.
    pub fn overlaps(&self, other: &Shift) -> bool {
        self.starts_at() < other.ends_at() && other.starts_at() < self.ends_at()
    }
}

pub fn shift_duration(start: NaiveTime, end: NaiveTime) -> Duration {
    let span = end.signed_duration_since(start);
    if span > Duration::zero() {
        span
    } else {
        span + Duration::days(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShift {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub function_id: i64,
    pub location_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftPatch {
    pub date: Option<NaiveDate>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub function_id: Option<i64>,
    pub location_id: Option<i64>,
}

impl ShiftPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.function_id.is_none()
            && self.location_id.is_none()
    }

    pub fn apply(&self, shift: &mut Shift) {
        if let Some(date) = self.date {
            shift.date = date;
        }
        if let Some(start) = self.start {
            shift.start = start;
        }
        if let Some(end) = self.end {
            shift.end = end;
        }
        if let Some(function_id) = self.function_id {
            shift.function_id = function_id;
        }
        if let Some(location_id) = self.location_id {
            shift.location_id = location_id;
        }
    }
}

/// Raised when a persisted status column holds an unexpected value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Cancelled,
}

impl AssignmentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Binding of one professional to one shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub professional_id: ProfessionalId,
    pub shift_id: ShiftId,
    pub status: AssignmentStatus,
    pub created_at: NaiveDateTime,
}

/// Requested changes for an assignment update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentChanges {
    pub professional_id: Option<ProfessionalId>,
    pub status: Option<AssignmentStatus>,
}

/// Assignment joined with its professional and shift for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentView {
    pub id: AssignmentId,
    pub professional_id: ProfessionalId,
    pub professional_name: String,
    pub shift_id: ShiftId,
    pub shift_date: NaiveDate,
    #[serde(with = "formats::hhmm")]
    pub start: NaiveTime,
    #[serde(with = "formats::hhmm")]
    pub end: NaiveTime,
    pub status: AssignmentStatus,
    pub created_at: NaiveDateTime,
}

/// An active assignment together with the shift it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub assignment_id: AssignmentId,
    pub professional_id: ProfessionalId,
    pub shift: Shift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubstitutionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubstitutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubstitutionStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Outcome chosen by a supervisor for a pending substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub const fn status(self) -> SubstitutionStatus {
        match self {
            Self::Approved => SubstitutionStatus::Approved,
            Self::Rejected => SubstitutionStatus::Rejected,
        }
    }

    pub const fn audit_action(self) -> AuditAction {
        match self {
            Self::Approved => AuditAction::StatusApproved,
            Self::Rejected => AuditAction::StatusRejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionRequest {
    pub id: SubstitutionId,
    pub assignment_id: AssignmentId,
    pub requesting_professional_id: ProfessionalId,
    pub substitute_professional_id: ProfessionalId,
    pub status: SubstitutionStatus,
    pub requested_at: NaiveDateTime,
    pub reason: Option<String>,
    pub decided_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubstitution {
    pub assignment_id: AssignmentId,
    pub requesting_professional_id: ProfessionalId,
    pub substitute_professional_id: ProfessionalId,
    pub reason: Option<String>,
}

/// Entity types that appear in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Professional,
    Shift,
    Assignment,
    Substitution,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Shift => "shift",
            Self::Assignment => "assignment",
            Self::Substitution => "substitution",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Created,
    Updated,
    Cancelled,
    Deactivated,
    StatusApproved,
    StatusRejected,
}

impl AuditAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Cancelled => "cancelled",
            Self::Deactivated => "deactivated",
            Self::StatusApproved => "status_approved",
            Self::StatusRejected => "status_rejected",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable trail record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub entity: String,
    pub entity_id: i64,
    pub action: String,
    pub actor: String,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub entity: EntityKind,
    pub entity_id: i64,
    pub action: AuditAction,
    pub actor: String,
    pub recorded_at: NaiveDateTime,
}

pub const DEFAULT_ACTOR: &str = "system";

/// Falls back to [`DEFAULT_ACTOR`] when the caller did not identify itself.
pub fn actor_or_default(actor: Option<&str>) -> &str {
    match actor.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => DEFAULT_ACTOR,
    }
}
