use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::booking::BookingRequest;
use super::domain::{
    AppointmentId, AppointmentStatus, LeaveRequestId, LeaveStatus, ProjectId, Technician,
    TechnicianId, TimeSlot, UserId,
};
use super::error::SchedulingError;
use super::reassignment::IncidentReport;
use super::repository::{Mailer, Notifier, SchedulingStore};
use super::reschedule::RescheduleChoice;
use super::roster::LeaveSubmission;
use super::service::Scheduler;

type SharedScheduler<S, N, M> = State<Arc<Scheduler<S, N, M>>>;

/// Router builder exposing the scheduling engine over HTTP.
pub fn scheduling_router<S, N, M>(scheduler: Arc<Scheduler<S, N, M>>) -> Router
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    Router::new()
        .route(
            "/api/v1/availability/technicians",
            get(available_technicians_handler::<S, N, M>),
        )
        .route(
            "/api/v1/availability/slots",
            get(open_slots_handler::<S, N, M>),
        )
        .route(
            "/api/v1/availability/overview",
            get(slot_overview_handler::<S, N, M>),
        )
        .route("/api/v1/assignments", post(book_handler::<S, N, M>))
        .route(
            "/api/v1/appointments/:appointment_id",
            get(appointment_handler::<S, N, M>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/status",
            put(status_handler::<S, N, M>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/photos",
            post(photos_handler::<S, N, M>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/timestamps",
            axum::routing::delete(clear_timestamps_handler::<S, N, M>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/reassign",
            post(reassign_handler::<S, N, M>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/incidents",
            post(incident_handler::<S, N, M>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/requests",
            get(admin_requests_handler::<S, N, M>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/reschedule-tokens",
            post(issue_token_handler::<S, N, M>),
        )
        .route(
            "/api/v1/reschedule/:token",
            get(validate_token_handler::<S, N, M>).post(redeem_token_handler::<S, N, M>),
        )
        .route(
            "/api/v1/technicians",
            get(list_technicians_handler::<S, N, M>).post(register_technician_handler::<S, N, M>),
        )
        .route(
            "/api/v1/technicians/:technician_id",
            get(technician_handler::<S, N, M>)
                .put(update_technician_handler::<S, N, M>)
                .delete(remove_technician_handler::<S, N, M>),
        )
        .route(
            "/api/v1/technicians/:technician_id/leave",
            get(technician_leave_handler::<S, N, M>).post(request_leave_handler::<S, N, M>),
        )
        .route(
            "/api/v1/technicians/:technician_id/absence",
            post(declare_absence_handler::<S, N, M>),
        )
        .route(
            "/api/v1/technicians/:technician_id/vacation",
            get(vacation_balance_handler::<S, N, M>),
        )
        .route("/api/v1/leave/:leave_id", put(decide_leave_handler::<S, N, M>))
        .with_state(scheduler)
}

/// Maps scheduling errors onto HTTP statuses with a stable `reason` code, so clients can tell
/// a taken slot from a missing record and an expired link from a used one.
pub fn error_response(error: SchedulingError) -> Response {
    let status = match &error {
        SchedulingError::NotFound { .. } => StatusCode::NOT_FOUND,
        SchedulingError::Conflict(_) => StatusCode::CONFLICT,
        SchedulingError::Token(rejection) => match rejection {
            super::domain::TokenRejection::Unknown => StatusCode::NOT_FOUND,
            super::domain::TokenRejection::AlreadyUsed => StatusCode::CONFLICT,
            super::domain::TokenRejection::Expired => StatusCode::GONE,
        },
        SchedulingError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SchedulingError::Downstream(_) => StatusCode::BAD_GATEWAY,
        SchedulingError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    let payload = json!({
        "error": error.to_string(),
        "reason": error.reason(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, SchedulingError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailabilityQuery {
    date: NaiveDate,
    slot: TimeSlot,
    #[serde(default)]
    exclude: Option<TechnicianId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DateQuery {
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct YearQuery {
    year: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChange {
    status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoUpload {
    photos: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReassignRequest {
    technician_id: TechnicianId,
    project_id: ProjectId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueTokenRequest {
    issuer_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AbsenceDeclaration {
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeaveDecision {
    status: LeaveStatus,
}

pub(crate) async fn available_technicians_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Query(query): Query<AvailabilityQuery>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let result =
        scheduler
            .availability()
            .find_available(query.date, query.slot, query.exclude.as_ref());
    respond(StatusCode::OK, result)
}

pub(crate) async fn open_slots_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Query(query): Query<DateQuery>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    match scheduler.availability().list_open_slots(query.date) {
        Ok(slots) => (
            StatusCode::OK,
            Json(json!({ "date": query.date, "slots": slots })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn slot_overview_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Query(query): Query<DateQuery>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::OK,
        scheduler.availability().slot_overview(query.date),
    )
}

pub(crate) async fn book_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Json(request): Json<BookingRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    respond(StatusCode::CREATED, scheduler.booking().book(request))
}

pub(crate) async fn appointment_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(appointment_id): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = AppointmentId(appointment_id);
    respond(StatusCode::OK, scheduler.lifecycle().get(&id))
}

pub(crate) async fn status_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(appointment_id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = AppointmentId(appointment_id);
    respond(
        StatusCode::OK,
        scheduler.lifecycle().set_status(&id, change.status),
    )
}

pub(crate) async fn photos_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(appointment_id): Path<String>,
    Json(upload): Json<PhotoUpload>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = AppointmentId(appointment_id);
    respond(
        StatusCode::OK,
        scheduler.lifecycle().append_photos(&id, upload.photos),
    )
}

pub(crate) async fn clear_timestamps_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(appointment_id): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = AppointmentId(appointment_id);
    respond(StatusCode::OK, scheduler.lifecycle().clear_timestamps(&id))
}

pub(crate) async fn reassign_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(appointment_id): Path<String>,
    Json(request): Json<ReassignRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = AppointmentId(appointment_id);
    respond(
        StatusCode::OK,
        scheduler
            .incidents()
            .reassign(&id, &request.technician_id, &request.project_id),
    )
}

pub(crate) async fn incident_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(appointment_id): Path<String>,
    Json(report): Json<IncidentReport>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = AppointmentId(appointment_id);
    respond(StatusCode::OK, scheduler.incidents().report_incident(&id, report))
}

pub(crate) async fn admin_requests_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(appointment_id): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = AppointmentId(appointment_id);
    respond(StatusCode::OK, scheduler.incidents().requests_for(&id))
}

pub(crate) async fn issue_token_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(appointment_id): Path<String>,
    Json(request): Json<IssueTokenRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = AppointmentId(appointment_id);
    let service = scheduler.reschedule();
    match service.issue_token(&id, &request.issuer_id) {
        Ok(token) => {
            let payload = json!({
                "token": token.token,
                "url": service.redemption_url(&token.token),
                "expires_at": token.expires_at,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn validate_token_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(token): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    respond(StatusCode::OK, scheduler.reschedule().validate(&token))
}

pub(crate) async fn redeem_token_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(token): Path<String>,
    Json(choice): Json<RescheduleChoice>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    respond(StatusCode::OK, scheduler.reschedule().redeem(&token, choice))
}

pub(crate) async fn list_technicians_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    respond(StatusCode::OK, scheduler.roster().list_technicians())
}

pub(crate) async fn register_technician_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Json(technician): Json<Technician>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::CREATED,
        scheduler.roster().register_technician(technician),
    )
}

pub(crate) async fn technician_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(technician_id): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = TechnicianId(technician_id);
    respond(StatusCode::OK, scheduler.roster().get_technician(&id))
}

pub(crate) async fn update_technician_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(technician_id): Path<String>,
    Json(mut technician): Json<Technician>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    technician.id = TechnicianId(technician_id);
    respond(
        StatusCode::OK,
        scheduler.roster().update_technician(technician),
    )
}

pub(crate) async fn remove_technician_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(technician_id): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = TechnicianId(technician_id);
    match scheduler.roster().remove_technician(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn technician_leave_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(technician_id): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = TechnicianId(technician_id);
    respond(StatusCode::OK, scheduler.roster().leave_for(&id))
}

pub(crate) async fn request_leave_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(technician_id): Path<String>,
    Json(submission): Json<LeaveSubmission>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = TechnicianId(technician_id);
    respond(
        StatusCode::CREATED,
        scheduler.roster().request_leave(&id, submission),
    )
}

pub(crate) async fn declare_absence_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(technician_id): Path<String>,
    Json(declaration): Json<AbsenceDeclaration>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = TechnicianId(technician_id);
    respond(
        StatusCode::CREATED,
        scheduler.roster().declare_absence(
            &id,
            declaration.start_date,
            declaration.end_date,
            declaration.reason,
        ),
    )
}

pub(crate) async fn vacation_balance_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(technician_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = TechnicianId(technician_id);
    respond(
        StatusCode::OK,
        scheduler.roster().vacation_balance(&id, query.year),
    )
}

pub(crate) async fn decide_leave_handler<S, N, M>(
    State(scheduler): SharedScheduler<S, N, M>,
    Path(leave_id): Path<String>,
    Json(decision): Json<LeaveDecision>,
) -> Response
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    let id = LeaveRequestId(leave_id);
    respond(
        StatusCode::OK,
        scheduler.roster().decide_leave(&id, decision.status),
    )
}
