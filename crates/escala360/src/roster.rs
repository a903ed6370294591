//! CSV roster import for professionals and shifts.
//!
//! Each row is applied in its own transaction through [`RegistryService`], so
//! a file that fails halfway keeps the rows before the failing line. Rows that
//! already exist are counted as skipped, which makes re-running an import safe.

use crate::scheduling::formats::{empty_string_as_none, parse_date, parse_time};
use crate::scheduling::{NewProfessional, NewShift, RegistryService, ScheduleStore, SchedulingError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

pub const IMPORT_ACTOR: &str = "import";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub skipped: usize,
}

impl ImportSummary {
    fn tally<T>(&mut self, outcome: Option<T>) {
        match outcome {
            Some(_) => self.created += 1,
            None => self.skipped += 1,
        }
    }
}

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Row { line: u64, source: SchedulingError },
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster file: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::Row { line, source } => {
                write!(f, "roster line {line} rejected: {source}")
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::Row { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct RosterImporter<'a, S: ScheduleStore> {
    registry: &'a RegistryService<S>,
}

impl<'a, S: ScheduleStore> RosterImporter<'a, S> {
    pub fn new(registry: &'a RegistryService<S>) -> Self {
        Self { registry }
    }

    pub fn professionals_from_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ImportSummary, RosterImportError> {
        let file = File::open(path)?;
        self.professionals_from_reader(file)
    }

    /// Expects `name,role,email,phone`; `phone` may be blank.
    pub fn professionals_from_reader<R: Read>(
        &self,
        reader: R,
    ) -> Result<ImportSummary, RosterImportError> {
        let mut summary = ImportSummary::default();
        for (line, row) in rows::<ProfessionalRow, R>(reader) {
            let row = row?;
            let outcome = self
                .registry
                .import_professional(row.into_new(), IMPORT_ACTOR)
                .map_err(|source| RosterImportError::Row { line, source })?;
            summary.tally(outcome);
        }
        info!(
            created = summary.created,
            skipped = summary.skipped,
            "imported professionals"
        );
        Ok(summary)
    }

    pub fn shifts_from_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ImportSummary, RosterImportError> {
        let file = File::open(path)?;
        self.shifts_from_reader(file)
    }

    /// Expects `date,start,end,function_id,location_id`.
    pub fn shifts_from_reader<R: Read>(
        &self,
        reader: R,
    ) -> Result<ImportSummary, RosterImportError> {
        let mut summary = ImportSummary::default();
        for (line, row) in rows::<ShiftRow, R>(reader) {
            let new = row?
                .into_new()
                .map_err(|source| RosterImportError::Row { line, source })?;
            let outcome = self
                .registry
                .import_shift(new, IMPORT_ACTOR)
                .map_err(|source| RosterImportError::Row { line, source })?;
            summary.tally(outcome);
        }
        info!(
            created = summary.created,
            skipped = summary.skipped,
            "imported shifts"
        );
        Ok(summary)
    }
}

/// Deserialized rows paired with their 1-based line number (header is line 1).
fn rows<T, R>(reader: R) -> impl Iterator<Item = (u64, Result<T, csv::Error>)>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .into_deserialize::<T>()
        .enumerate()
        .map(|(index, row)| (index as u64 + 2, row))
}

#[derive(Debug, Deserialize)]
struct ProfessionalRow {
    name: String,
    role: String,
    email: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
}

impl ProfessionalRow {
    fn into_new(self) -> NewProfessional {
        NewProfessional {
            name: self.name,
            role: self.role,
            email: self.email,
            phone: self.phone,
            active: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ShiftRow {
    date: String,
    start: String,
    end: String,
    function_id: i64,
    location_id: i64,
}

impl ShiftRow {
    fn into_new(self) -> Result<NewShift, SchedulingError> {
        Ok(NewShift {
            date: parse_date(&self.date).map_err(SchedulingError::Validation)?,
            start: parse_time(&self.start).map_err(SchedulingError::Validation)?,
            end: parse_time(&self.end).map_err(SchedulingError::Validation)?,
            function_id: self.function_id,
            location_id: self.location_id,
        })
    }
}
