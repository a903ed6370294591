use crate::infra::open_store;
use clap::Args;
use escala360::config::AppConfig;
use escala360::error::AppError;
use escala360::roster::{ImportSummary, RosterImporter};
use escala360::scheduling::migrations::latest_version;
use escala360::scheduling::{RegistryService, ScheduleStore, SqliteStore, SystemClock};
use escala360::telemetry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
#[group(required = true, multiple = true)]
pub(crate) struct ImportArgs {
    /// CSV with `name,role,email,phone` columns
    #[arg(long)]
    pub(crate) professionals: Option<PathBuf>,
    /// CSV with `date,start,end,function_id,location_id` columns
    #[arg(long)]
    pub(crate) shifts: Option<PathBuf>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ImportReport {
    pub(crate) professionals: Option<ImportSummary>,
    pub(crate) shifts: Option<ImportSummary>,
}

pub(crate) fn run_migrate() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = SqliteStore::open_location(&config.database.path)?;
    let applied = store.migrate()?;
    println!(
        "{}: applied {applied} migration(s), schema at version {}",
        config.database.path,
        latest_version()
    );
    Ok(())
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = open_store(&config.database)?;
    let registry = RegistryService::new(store, config.scheduling, Arc::new(SystemClock));
    let report = import_files(&registry, &args)?;

    if let Some(summary) = report.professionals {
        print_summary("professionals", summary);
    }
    if let Some(summary) = report.shifts {
        print_summary("shifts", summary);
    }
    Ok(())
}

/// Professionals go first so a combined run mirrors how rosters are built.
pub(crate) fn import_files<S: ScheduleStore>(
    registry: &RegistryService<S>,
    args: &ImportArgs,
) -> Result<ImportReport, AppError> {
    let importer = RosterImporter::new(registry);
    let mut report = ImportReport::default();

    if let Some(path) = &args.professionals {
        report.professionals = Some(importer.professionals_from_path(path)?);
    }
    if let Some(path) = &args.shifts {
        report.shifts = Some(importer.shifts_from_path(path)?);
    }
    Ok(report)
}

fn print_summary(label: &str, summary: ImportSummary) {
    println!(
        "{label}: {} created, {} already present",
        summary.created, summary.skipped
    );
}
