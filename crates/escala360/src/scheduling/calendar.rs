use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

/// Inclusive date window; an open bound matches everything on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub const fn all() -> Self {
        Self {
            from: None,
            to: None,
        }
    }

    pub const fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }

    /// The target date plus its neighbours, enough to catch overnight shifts
    /// that spill into (or start before) the target day.
    pub fn around(date: NaiveDate) -> Self {
        let from = date.pred_opt().unwrap_or(date);
        let to = date.succ_opt().unwrap_or(date);
        Self::between(from, to)
    }
}

/// Monday-to-Sunday ISO calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IsoWeek {
    pub monday: NaiveDate,
    pub sunday: NaiveDate,
}

impl IsoWeek {
    /// Weeks cut off by the ends of the calendar are clamped to
    /// `NaiveDate::MIN`/`MAX` instead of overflowing.
    pub fn containing(date: NaiveDate) -> Self {
        let offset = i64::from(date.weekday().num_days_from_monday());
        let monday = date
            .checked_sub_signed(Duration::days(offset))
            .unwrap_or(NaiveDate::MIN);
        let sunday = monday
            .checked_add_signed(Duration::days(6))
            .unwrap_or(NaiveDate::MAX);
        Self { monday, sunday }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.monday <= date && date <= self.sunday
    }

    pub fn range(&self) -> DateRange {
        DateRange::between(self.monday, self.sunday)
    }
}
