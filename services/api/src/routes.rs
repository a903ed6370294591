use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use escala360::error::AppError;
use escala360::roster::{ImportSummary, RosterImportError, RosterImporter};
use escala360::scheduling::{
    scheduling_router, RegistryService, ScheduleStore, SchedulingError, SchedulingServices,
    StoreError,
};
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

/// Scheduling API plus roster uploads, health checks and metrics used by the deployment.
pub(crate) fn with_operational_routes<S>(services: SchedulingServices<S>) -> Router
where
    S: ScheduleStore + 'static,
{
    let roster = Router::new()
        .route("/roster/professionals", post(roster_professionals_endpoint::<S>))
        .route("/roster/shifts", post(roster_shifts_endpoint::<S>))
        .with_state(Arc::clone(&services.registry));

    scheduling_router(services)
        .merge(roster)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RosterUpload {
    csv: String,
}

#[derive(Debug, Clone, Copy)]
enum RosterKind {
    Professionals,
    Shifts,
}

pub(crate) async fn roster_professionals_endpoint<S: ScheduleStore + 'static>(
    State(registry): State<Arc<RegistryService<S>>>,
    Json(upload): Json<RosterUpload>,
) -> Result<Json<ImportSummary>, AppError> {
    import_roster(registry, upload, RosterKind::Professionals).await
}

pub(crate) async fn roster_shifts_endpoint<S: ScheduleStore + 'static>(
    State(registry): State<Arc<RegistryService<S>>>,
    Json(upload): Json<RosterUpload>,
) -> Result<Json<ImportSummary>, AppError> {
    import_roster(registry, upload, RosterKind::Shifts).await
}

async fn import_roster<S: ScheduleStore + 'static>(
    registry: Arc<RegistryService<S>>,
    upload: RosterUpload,
    kind: RosterKind,
) -> Result<Json<ImportSummary>, AppError> {
    let summary = tokio::task::spawn_blocking(move || {
        let importer = RosterImporter::new(&registry);
        let reader = Cursor::new(upload.csv.into_bytes());
        match kind {
            RosterKind::Professionals => importer.professionals_from_reader(reader),
            RosterKind::Shifts => importer.shifts_from_reader(reader),
        }
    })
    .await
    .map_err(|err| StoreError::Unavailable(format!("import task failed: {err}")))?
    .map_err(reject_roster)?;
    Ok(Json(summary))
}

/// Storage failures keep their own status; anything else is a bad upload.
fn reject_roster(err: RosterImportError) -> AppError {
    match err {
        RosterImportError::Row {
            source: SchedulingError::Store(store),
            ..
        } => AppError::Store(store),
        other => AppError::Import(other),
    }
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
