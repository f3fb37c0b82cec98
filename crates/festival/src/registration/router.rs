use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    Actor, DetailRole, EventCategory, EventId, HouseId, NewEvent, StudentId, UserRole,
};
use super::eligibility::Decision;
use super::service::{RegistrationError, RegistrationRequest, RegistrationService};
use super::store::{FestivalStore, NewWinner, StoreError};

/// Header carrying the caller's role, set by the upstream auth layer.
pub const ROLE_HEADER: &str = "x-festival-role";
/// Header carrying the captain's house id.
pub const HOUSE_HEADER: &str = "x-festival-house";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArtsCheckRequest {
    pub student_id: StudentId,
    pub event_id: EventId,
    pub role: DetailRole,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SportsCheckRequest {
    pub student_id: StudentId,
    pub event_id: EventId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlotCheckRequest {
    pub house_id: HouseId,
    pub event_id: EventId,
    pub category: EventCategory,
}

/// Boolean-plus-reason view of an admission decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityView {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Decision> for EligibilityView {
    fn from(decision: &Decision) -> Self {
        Self {
            allowed: decision.is_admitted(),
            reason: decision.reason().map(|reason| reason.summary()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub has_slots: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Decision> for SlotView {
    fn from(decision: &Decision) -> Self {
        Self {
            has_slots: decision.is_admitted(),
            reason: decision.reason().map(|reason| reason.summary()),
        }
    }
}

/// Router builder exposing eligibility checks, registration, and results.
pub fn registration_router<S>(service: Arc<RegistrationService<S>>) -> Router
where
    S: FestivalStore + 'static,
{
    Router::new()
        .route("/api/v1/eligibility/arts", post(arts_check_handler::<S>))
        .route("/api/v1/eligibility/sports", post(sports_check_handler::<S>))
        .route("/api/v1/eligibility/slots", post(slot_check_handler::<S>))
        .route(
            "/api/v1/students/:student_id/participation",
            get(participation_handler::<S>),
        )
        .route("/api/v1/houses/:house_id", get(house_handler::<S>))
        .route("/api/v1/registrations", post(register_handler::<S>))
        .route("/api/v1/events", post(create_event_handler::<S>))
        .route("/api/v1/events/:category", get(list_events_handler::<S>))
        .route("/api/v1/winners", post(winner_handler::<S>))
        .route("/api/v1/leaderboard", get(leaderboard_handler::<S>))
        .with_state(service)
}

/// Runs store-bound service work on the blocking pool so SQLite I/O and the
/// admission lock never stall the async workers.
async fn run_blocking<S, T, F>(
    service: Arc<RegistrationService<S>>,
    work: F,
) -> Result<T, RegistrationError>
where
    S: FestivalStore + 'static,
    T: Send + 'static,
    F: FnOnce(&RegistrationService<S>) -> Result<T, RegistrationError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(service.as_ref()))
        .await
        .map_err(|err| {
            RegistrationError::Store(StoreError::Unavailable(format!(
                "registration task failed: {err}"
            )))
        })?
}

fn respond<T: Serialize>(status: StatusCode, outcome: Result<T, RegistrationError>) -> Response {
    match outcome {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn arts_check_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
    axum::Json(request): axum::Json<ArtsCheckRequest>,
) -> Response
where
    S: FestivalStore + 'static,
{
    let outcome = run_blocking(service, move |service| {
        service
            .check_arts(request.student_id, request.event_id, request.role)
            .map(|decision| EligibilityView::from(&decision))
    })
    .await;
    respond(StatusCode::OK, outcome)
}

pub(crate) async fn sports_check_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
    axum::Json(request): axum::Json<SportsCheckRequest>,
) -> Response
where
    S: FestivalStore + 'static,
{
    let outcome = run_blocking(service, move |service| {
        service
            .check_sports(request.student_id, request.event_id)
            .map(|decision| EligibilityView::from(&decision))
    })
    .await;
    respond(StatusCode::OK, outcome)
}

pub(crate) async fn slot_check_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
    axum::Json(request): axum::Json<SlotCheckRequest>,
) -> Response
where
    S: FestivalStore + 'static,
{
    let outcome = run_blocking(service, move |service| {
        service
            .check_slots(request.house_id, request.event_id, request.category)
            .map(|decision| SlotView::from(&decision))
    })
    .await;
    respond(StatusCode::OK, outcome)
}

pub(crate) async fn participation_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
    Path(student_id): Path<u64>,
) -> Response
where
    S: FestivalStore + 'static,
{
    let outcome = run_blocking(service, move |service| {
        service.participation(StudentId(student_id))
    })
    .await;
    respond(StatusCode::OK, outcome)
}

pub(crate) async fn house_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
    Path(house_id): Path<u64>,
    headers: HeaderMap,
) -> Response
where
    S: FestivalStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let outcome = run_blocking(service, move |service| {
        service.house_summary(&actor, HouseId(house_id))
    })
    .await;
    respond(StatusCode::OK, outcome)
}

pub(crate) async fn register_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<RegistrationRequest>,
) -> Response
where
    S: FestivalStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let outcome = run_blocking(service, move |service| service.register(&actor, request)).await;
    respond(StatusCode::CREATED, outcome)
}

pub(crate) async fn create_event_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
    headers: HeaderMap,
    axum::Json(event): axum::Json<NewEvent>,
) -> Response
where
    S: FestivalStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let outcome = run_blocking(service, move |service| service.create_event(&actor, event)).await;
    respond(StatusCode::CREATED, outcome)
}

pub(crate) async fn list_events_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
    Path(category): Path<String>,
) -> Response
where
    S: FestivalStore + 'static,
{
    let Some(category) = EventCategory::parse(&category) else {
        let payload = json!({ "error": format!("unknown event category '{category}'") });
        return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
    };
    let outcome = run_blocking(service, move |service| {
        Ok(service.store().events(category)?)
    })
    .await;
    respond(StatusCode::OK, outcome)
}

pub(crate) async fn winner_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
    headers: HeaderMap,
    axum::Json(winner): axum::Json<NewWinner>,
) -> Response
where
    S: FestivalStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let outcome = run_blocking(service, move |service| service.record_winner(&actor, winner)).await;
    respond(StatusCode::CREATED, outcome)
}

pub(crate) async fn leaderboard_handler<S>(
    State(service): State<Arc<RegistrationService<S>>>,
) -> Response
where
    S: FestivalStore + 'static,
{
    let outcome = run_blocking(service, |service| service.leaderboard()).await;
    respond(StatusCode::OK, outcome)
}

/// Builds the caller's capability from the trusted auth headers.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let Some(raw_role) = headers.get(ROLE_HEADER) else {
        let payload = json!({ "error": format!("missing {ROLE_HEADER} header") });
        return Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response());
    };

    let role = match raw_role
        .to_str()
        .map(|value| value.trim().to_ascii_lowercase())
        .as_deref()
    {
        Ok("admin") => UserRole::Admin,
        Ok("user") | Ok("captain") => UserRole::User,
        _ => return Err(bad_header(ROLE_HEADER)),
    };

    let house_id = match headers.get(HOUSE_HEADER) {
        None => None,
        Some(raw) => {
            let parsed = raw
                .to_str()
                .ok()
                .and_then(|value| value.trim().parse::<u64>().ok());
            match parsed {
                Some(id) => Some(HouseId(id)),
                None => return Err(bad_header(HOUSE_HEADER)),
            }
        }
    };

    Ok(Actor { role, house_id })
}

fn bad_header(name: &str) -> Response {
    let payload = json!({ "error": format!("invalid {name} header") });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn error_response(error: RegistrationError) -> Response {
    let status = error.status_code();
    let payload = match &error {
        RegistrationError::Rejected { student_id, reason } => json!({
            "error": error.to_string(),
            "reason": reason.summary(),
            "student_id": student_id,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, axum::Json(payload)).into_response()
}
