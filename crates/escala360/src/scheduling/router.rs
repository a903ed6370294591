use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::assignments::AssignmentService;
use super::audit::{AuditService, AuditSummary};
use super::calendar::DateRange;
use super::dashboard::{DashboardService, DashboardSummary};
use super::domain::{
    actor_or_default, AssignmentChanges, AssignmentId, AssignmentStatus, AssignmentView,
    AuditEntry, AuditEntryId, Decision, NewProfessional, NewShift, NewSubstitution, Professional,
    ProfessionalId, ProfessionalPatch, Shift, ShiftId, ShiftPatch, SubstitutionId,
    SubstitutionRequest, SubstitutionStatus,
};
use super::error::SchedulingError;
use super::formats::{
    self, deserialize_optional_date, deserialize_optional_time, empty_string_as_none,
};
use super::policy::{Clock, SchedulingPolicy};
use super::registry::RegistryService;
use super::store::{AssignmentFilter, AuditFilter, ScheduleStore, StoreError};
use super::substitutions::{SubstituteCandidate, SubstitutionService, DEFAULT_SUGGESTION_LIMIT};

/// Every scheduling service, shared by the HTTP handlers.
pub struct SchedulingServices<S> {
    pub assignments: Arc<AssignmentService<S>>,
    pub substitutions: Arc<SubstitutionService<S>>,
    pub registry: Arc<RegistryService<S>>,
    pub audit: Arc<AuditService<S>>,
    pub dashboard: Arc<DashboardService<S>>,
}

impl<S> Clone for SchedulingServices<S> {
    fn clone(&self) -> Self {
        Self {
            assignments: Arc::clone(&self.assignments),
            substitutions: Arc::clone(&self.substitutions),
            registry: Arc::clone(&self.registry),
            audit: Arc::clone(&self.audit),
            dashboard: Arc::clone(&self.dashboard),
        }
    }
}

impl<S: ScheduleStore> SchedulingServices<S> {
    pub fn new(store: Arc<S>, policy: SchedulingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            assignments: Arc::new(AssignmentService::new(
                Arc::clone(&store),
                policy,
                Arc::clone(&clock),
            )),
            substitutions: Arc::new(SubstitutionService::new(
                Arc::clone(&store),
                policy,
                Arc::clone(&clock),
            )),
            registry: Arc::new(RegistryService::new(Arc::clone(&store), policy, clock)),
            audit: Arc::new(AuditService::new(Arc::clone(&store))),
            dashboard: Arc::new(DashboardService::new(store)),
        }
    }
}

/// Router exposing the scheduling API.
pub fn scheduling_router<S>(services: SchedulingServices<S>) -> Router
where
    S: ScheduleStore + 'static,
{
    Router::new()
        .route(
            "/assignments",
            get(list_assignments::<S>).post(create_assignment::<S>),
        )
        .route(
            "/assignments/:id",
            get(get_assignment::<S>)
                .put(update_assignment::<S>)
                .delete(cancel_assignment::<S>),
        )
        .route(
            "/substitutions",
            get(list_substitutions::<S>).post(request_substitution::<S>),
        )
        .route(
            "/substitutions/:id",
            get(get_substitution::<S>).put(decide_substitution::<S>),
        )
        .route(
            "/substitutions/:id/suggestions",
            get(suggest_substitutes::<S>),
        )
        .route("/audit", get(query_audit::<S>))
        .route("/audit/summary", get(audit_summary::<S>))
        .route("/audit/:id", get(get_audit_entry::<S>))
        .route(
            "/professionals",
            get(list_professionals::<S>).post(register_professional::<S>),
        )
        .route(
            "/professionals/:id",
            get(get_professional::<S>)
                .put(update_professional::<S>)
                .delete(deactivate_professional::<S>),
        )
        .route("/shifts", get(list_shifts::<S>).post(create_shift::<S>))
        .route("/shifts/:id", get(get_shift::<S>).put(update_shift::<S>))
        .route("/dashboard", get(dashboard::<S>))
        .with_state(services)
}

impl IntoResponse for SchedulingError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::CapacityExceeded { .. } | Self::LeadTimeViolation { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "scheduling request failed");
        }

        let payload = json!({
            "ok": false,
            "kind": self.kind(),
            "error": self.to_string(),
        });
        (status, Json(payload)).into_response()
    }
}

type ApiResult<T> = Result<T, SchedulingError>;

async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ApiResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        SchedulingError::Store(StoreError::Unavailable(format!(
            "worker task failed: {err}"
        )))
    })?
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| SchedulingError::Validation(rejection.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| SchedulingError::Validation(rejection.body_text()))
}

fn path_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|rejection| SchedulingError::Validation(rejection.body_text()))
}

fn created(id: i64) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "ok": true, "id": id })))
}

fn updated(id: i64) -> Json<Value> {
    Json(json!({ "ok": true, "id": id }))
}

#[derive(Debug, Default, Deserialize)]
struct RangeQuery {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    to: Option<NaiveDate>,
}

impl RangeQuery {
    fn range(&self) -> DateRange {
        DateRange {
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ActorQuery {
    #[serde(default)]
    actor: Option<String>,
}

// Assignments

#[derive(Debug, Default, Deserialize)]
struct AssignmentQuery {
    #[serde(default)]
    professional_id: Option<ProfessionalId>,
    #[serde(default)]
    shift_id: Option<ShiftId>,
    #[serde(default)]
    status: Option<AssignmentStatus>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateAssignmentRequest {
    pub(crate) professional_id: ProfessionalId,
    pub(crate) shift_id: ShiftId,
    #[serde(default)]
    pub(crate) actor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateAssignmentRequest {
    #[serde(default)]
    professional_id: Option<ProfessionalId>,
    #[serde(default)]
    status: Option<AssignmentStatus>,
    #[serde(default)]
    actor: Option<String>,
}

async fn list_assignments<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    params: Result<Query<AssignmentQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AssignmentView>>> {
    let params = query(params)?;
    let filter = AssignmentFilter {
        professional_id: params.professional_id,
        shift_id: params.shift_id,
        status: params.status,
        range: DateRange {
            from: params.from,
            to: params.to,
        },
    };
    let service = Arc::clone(&services.assignments);
    blocking(move || service.list(&filter)).await.map(Json)
}

pub(crate) async fn create_assignment<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    payload: Result<Json<CreateAssignmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let request = json_body(payload)?;
    let service = Arc::clone(&services.assignments);
    let assignment = blocking(move || {
        service.create(
            request.professional_id,
            request.shift_id,
            actor_or_default(request.actor.as_deref()),
        )
    })
    .await?;
    Ok(created(assignment.id.0))
}

async fn get_assignment<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<AssignmentView>> {
    let id = AssignmentId(path_id(id)?);
    let service = Arc::clone(&services.assignments);
    blocking(move || service.get(id)).await.map(Json)
}

async fn update_assignment<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateAssignmentRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = AssignmentId(path_id(id)?);
    let request = json_body(payload)?;
    let changes = AssignmentChanges {
        professional_id: request.professional_id,
        status: request.status,
    };
    let service = Arc::clone(&services.assignments);
    let assignment = blocking(move || {
        service.update(id, changes, actor_or_default(request.actor.as_deref()))
    })
    .await?;
    Ok(updated(assignment.id.0))
}

async fn cancel_assignment<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<ActorQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let id = AssignmentId(path_id(id)?);
    let params = query(params)?;
    let service = Arc::clone(&services.assignments);
    let assignment =
        blocking(move || service.cancel(id, actor_or_default(params.actor.as_deref()))).await?;
    Ok(updated(assignment.id.0))
}

// Substitutions

#[derive(Debug, Default, Deserialize)]
struct SubstitutionQuery {
    #[serde(default)]
    status: Option<SubstitutionStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubstitutionPayload {
    pub(crate) assignment_id: AssignmentId,
    pub(crate) requesting_professional_id: ProfessionalId,
    pub(crate) substitute_professional_id: ProfessionalId,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) reason: Option<String>,
    #[serde(default)]
    pub(crate) actor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DecisionPayload {
    status: Decision,
    #[serde(default)]
    actor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SuggestionQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn list_substitutions<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    params: Result<Query<SubstitutionQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<SubstitutionRequest>>> {
    let status = query(params)?.status;
    let service = Arc::clone(&services.substitutions);
    blocking(move || service.list(status)).await.map(Json)
}

pub(crate) async fn request_substitution<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    payload: Result<Json<SubstitutionPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let payload = json_body(payload)?;
    let new = NewSubstitution {
        assignment_id: payload.assignment_id,
        requesting_professional_id: payload.requesting_professional_id,
        substitute_professional_id: payload.substitute_professional_id,
        reason: payload.reason,
    };
    let service = Arc::clone(&services.substitutions);
    let request =
        blocking(move || service.request(&new, actor_or_default(payload.actor.as_deref())))
            .await?;
    Ok(created(request.id.0))
}

async fn get_substitution<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<SubstitutionRequest>> {
    let id = SubstitutionId(path_id(id)?);
    let service = Arc::clone(&services.substitutions);
    blocking(move || service.get(id)).await.map(Json)
}

async fn decide_substitution<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<DecisionPayload>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = SubstitutionId(path_id(id)?);
    let payload = json_body(payload)?;
    let service = Arc::clone(&services.substitutions);
    let request = blocking(move || {
        service.decide(id, payload.status, actor_or_default(payload.actor.as_deref()))
    })
    .await?;
    Ok(updated(request.id.0))
}

async fn suggest_substitutes<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<SuggestionQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<SubstituteCandidate>>> {
    let assignment_id = AssignmentId(path_id(id)?);
    let limit = query(params)?.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT);
    let service = Arc::clone(&services.substitutions);
    let suggestions = blocking(move || service.suggest(assignment_id, limit)).await?;
    Ok(Json(suggestions.iter().cloned().collect()))
}

// Audit

#[derive(Debug, Default, Deserialize)]
struct AuditQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    entity: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    actor: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    to: Option<NaiveDate>,
}

async fn query_audit<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    params: Result<Query<AuditQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let params = query(params)?;
    let filter = AuditFilter {
        entity: params.entity,
        actor: params.actor,
        range: DateRange {
            from: params.from,
            to: params.to,
        },
    };
    let service = Arc::clone(&services.audit);
    blocking(move || service.query(&filter)).await.map(Json)
}

async fn audit_summary<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
) -> ApiResult<Json<AuditSummary>> {
    let service = Arc::clone(&services.audit);
    blocking(move || service.summary()).await.map(Json)
}

async fn get_audit_entry<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<AuditEntry>> {
    let id = AuditEntryId(path_id(id)?);
    let service = Arc::clone(&services.audit);
    blocking(move || service.get(id)).await.map(Json)
}

// Professionals

#[derive(Debug, Default, Deserialize)]
struct ProfessionalQuery {
    #[serde(default)]
    active_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ProfessionalPayload {
    name: String,
    role: String,
    email: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    actor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfessionalPatchPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    actor: Option<String>,
}

async fn list_professionals<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    params: Result<Query<ProfessionalQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Professional>>> {
    let active_only = query(params)?.active_only.unwrap_or(false);
    let service = Arc::clone(&services.registry);
    blocking(move || service.list_professionals(active_only))
        .await
        .map(Json)
}

async fn register_professional<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    payload: Result<Json<ProfessionalPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let payload = json_body(payload)?;
    let new = NewProfessional {
        name: payload.name,
        role: payload.role,
        email: payload.email,
        phone: payload.phone,
        active: payload.active.unwrap_or(true),
    };
    let service = Arc::clone(&services.registry);
    let professional = blocking(move || {
        service.register_professional(new, actor_or_default(payload.actor.as_deref()))
    })
    .await?;
    Ok(created(professional.id.0))
}

async fn get_professional<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Professional>> {
    let id = ProfessionalId(path_id(id)?);
    let service = Arc::clone(&services.registry);
    blocking(move || service.get_professional(id)).await.map(Json)
}

async fn update_professional<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProfessionalPatchPayload>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = ProfessionalId(path_id(id)?);
    let payload = json_body(payload)?;
    let patch = ProfessionalPatch {
        name: payload.name,
        role: payload.role,
        email: payload.email,
        phone: payload.phone,
        active: payload.active,
    };
    let service = Arc::clone(&services.registry);
    let professional = blocking(move || {
        service.update_professional(id, patch, actor_or_default(payload.actor.as_deref()))
    })
    .await?;
    Ok(updated(professional.id.0))
}

async fn deactivate_professional<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<ActorQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let id = ProfessionalId(path_id(id)?);
    let params = query(params)?;
    let service = Arc::clone(&services.registry);
    let professional = blocking(move || {
        service.deactivate_professional(id, actor_or_default(params.actor.as_deref()))
    })
    .await?;
    Ok(updated(professional.id.0))
}

// Shifts

#[derive(Debug, Deserialize)]
struct ShiftPayload {
    date: NaiveDate,
    #[serde(with = "formats::hhmm")]
    start: NaiveTime,
    #[serde(with = "formats::hhmm")]
    end: NaiveTime,
    function_id: i64,
    location_id: i64,
    #[serde(default)]
    actor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShiftPatchPayload {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_time")]
    start: Option<NaiveTime>,
    #[serde(default, deserialize_with = "deserialize_optional_time")]
    end: Option<NaiveTime>,
    #[serde(default)]
    function_id: Option<i64>,
    #[serde(default)]
    location_id: Option<i64>,
    #[serde(default)]
    actor: Option<String>,
}

async fn list_shifts<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    params: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Shift>>> {
    let range = query(params)?.range();
    let service = Arc::clone(&services.registry);
    blocking(move || service.list_shifts(&range)).await.map(Json)
}

async fn create_shift<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    payload: Result<Json<ShiftPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let payload = json_body(payload)?;
    let new = NewShift {
        date: payload.date,
        start: payload.start,
        end: payload.end,
        function_id: payload.function_id,
        location_id: payload.location_id,
    };
    let service = Arc::clone(&services.registry);
    let shift =
        blocking(move || service.create_shift(new, actor_or_default(payload.actor.as_deref())))
            .await?;
    Ok(created(shift.id.0))
}

async fn get_shift<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Shift>> {
    let id = ShiftId(path_id(id)?);
    let service = Arc::clone(&services.registry);
    blocking(move || service.get_shift(id)).await.map(Json)
}

async fn update_shift<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ShiftPatchPayload>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = ShiftId(path_id(id)?);
    let payload = json_body(payload)?;
    let patch = ShiftPatch {
        date: payload.date,
        start: payload.start,
        end: payload.end,
        function_id: payload.function_id,
        location_id: payload.location_id,
    };
    let service = Arc::clone(&services.registry);
    let shift = blocking(move || {
        service.update_shift(id, patch, actor_or_default(payload.actor.as_deref()))
    })
    .await?;
    Ok(updated(shift.id.0))
}

// Dashboard

async fn dashboard<S: ScheduleStore + 'static>(
    State(services): State<SchedulingServices<S>>,
    params: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<Json<DashboardSummary>> {
    let range = query(params)?.range();
    let service = Arc::clone(&services.dashboard);
    blocking(move || service.summary(&range)).await.map(Json)
}
