use chrono::{Duration, Local, NaiveDateTime};

/// Business limits applied by the assignment and substitution services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingPolicy {
    /// Maximum booked hours per professional within one ISO week.
    pub weekly_hours_cap: u32,
    /// Minimum notice, in hours, between a substitution request and shift start.
    pub substitution_lead_hours: u32,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            weekly_hours_cap: 40,
            substitution_lead_hours: 12,
        }
    }
}

impl SchedulingPolicy {
    pub fn weekly_cap_minutes(&self) -> i64 {
        i64::from(self.weekly_hours_cap) * 60
    }

    pub fn lead_time(&self) -> Duration {
        Duration::hours(i64::from(self.substitution_lead_hours))
    }

    /// A request is on time only when it is strictly earlier than
    /// `shift_start - lead_time`. A deadline before the start of the calendar
    /// can never be met.
    pub fn lead_time_satisfied(
        &self,
        requested_at: NaiveDateTime,
        shift_start: NaiveDateTime,
    ) -> bool {
        shift_start
            .checked_sub_signed(self.lead_time())
            .is_some_and(|deadline| requested_at < deadline)
    }
}

/// Source of "now" for timestamps and lead-time checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the server's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
