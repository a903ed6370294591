use escala360::config::{AppConfig, DatabaseConfig};
use escala360::error::AppError;
use escala360::scheduling::{SchedulingServices, SqliteStore, SystemClock};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Opens the configured database and brings its schema up to date.
pub(crate) fn open_store(config: &DatabaseConfig) -> Result<Arc<SqliteStore>, AppError> {
    let store = SqliteStore::open_location(&config.path)?;
    let applied = store.migrate()?;
    info!(path = %config.path, applied, "database ready");
    Ok(Arc::new(store))
}

pub(crate) fn build_services(
    config: &AppConfig,
    store: Arc<SqliteStore>,
) -> SchedulingServices<SqliteStore> {
    SchedulingServices::new(store, config.scheduling, Arc::new(SystemClock))
}
