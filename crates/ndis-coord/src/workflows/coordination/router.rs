use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::access::{Capability, Role, ROLE_HEADER};
use super::domain::{
    DocumentId, ServiceRequestId, ServiceRequestStatus, TimesheetId, VerificationStatus, WorkerId,
};
use super::repository::{CoordinationRepository, NotificationPublisher};
use super::service::{
    AssignCommand, CandidateSearch, CoordinationError, CoordinationService, DocumentUpload,
    ErrorKind, PayQuote, RequestSubmission, TimesheetSubmission, WorkerRegistration,
};

type SharedService<R, N> = Arc<CoordinationService<R, N>>;

/// Router builder exposing the coordination endpoints. Every route requires a role header.
pub fn coordination_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/workers", post(register_worker::<R, N>))
        .route("/api/v1/workers/:worker_id", get(fetch_worker::<R, N>))
        .route(
            "/api/v1/workers/:worker_id/documents",
            post(upload_document::<R, N>),
        )
        .route(
            "/api/v1/workers/:worker_id/documents/:document_id/verification",
            post(verify_document::<R, N>),
        )
        .route("/api/v1/compliance/alerts", get(compliance_alerts::<R, N>))
        .route("/api/v1/requests", post(submit_request::<R, N>))
        .route("/api/v1/requests/:request_id", get(fetch_request::<R, N>))
        .route(
            "/api/v1/requests/:request_id/review",
            post(review_request::<R, N>),
        )
        .route(
            "/api/v1/requests/:request_id/candidates",
            get(candidates::<R, N>),
        )
        .route(
            "/api/v1/requests/:request_id/assignment",
            post(assign_worker::<R, N>),
        )
        .route(
            "/api/v1/requests/:request_id/auto-assignment",
            post(auto_assign::<R, N>),
        )
        .route(
            "/api/v1/requests/:request_id/confirmation",
            post(confirm_request::<R, N>),
        )
        .route(
            "/api/v1/requests/:request_id/cancellation",
            post(cancel_request::<R, N>),
        )
        .route(
            "/api/v1/assignments/active",
            get(active_assignments::<R, N>),
        )
        .route("/api/v1/timesheets", post(submit_timesheet::<R, N>))
        .route(
            "/api/v1/timesheets/:timesheet_id/approval",
            post(approve_timesheet::<R, N>),
        )
        .route(
            "/api/v1/timesheets/:timesheet_id/rejection",
            post(reject_timesheet::<R, N>),
        )
        .route("/api/v1/pay/quote", post(pay_quote::<R, N>))
        .route(
            "/api/v1/ledger/completions",
            post(run_completions::<R, N>),
        )
        .route("/api/v1/ledger/events", get(ledger_events::<R, N>))
        .route("/api/v1/invoices", get(invoices::<R, N>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerificationDecision {
    pub(crate) status: VerificationStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExpectedStatus {
    pub(crate) expected_status: ServiceRequestStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectionBody {
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AsOfDate {
    pub(crate) as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AsOfInstant {
    pub(crate) as_of: Option<NaiveDateTime>,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Completions run on the server clock. A caller may sweep as of an earlier instant but never
/// a later one.
pub(crate) fn completion_cutoff(
    requested: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> NaiveDateTime {
    requested.map_or(now, |requested| requested.min(now))
}

/// Resolves the caller's role once per request and checks the capability table.
fn authorize(headers: &HeaderMap, capability: Capability) -> Result<Role, Response> {
    let Some(role) = Role::from_headers(headers) else {
        let payload = json!({
            "error": format!("missing or unknown {ROLE_HEADER} header"),
            "kind": "unauthenticated",
            "action": "sign_in",
        });
        return Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response());
    };

    if role.permits(capability) {
        Ok(role)
    } else {
        let payload = json!({
            "error": format!("role {} may not perform this operation", role.label()),
            "kind": "forbidden",
            "action": "request_access",
        });
        Err((StatusCode::FORBIDDEN, Json(payload)).into_response())
    }
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput
        | ErrorKind::InvalidDocument
        | ErrorKind::InvalidTimesheet
        | ErrorKind::UnknownClassification
        | ErrorKind::NoRateTableInForce
        | ErrorKind::WorkerNotEligible => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound | ErrorKind::NoEligibleWorker => StatusCode::NOT_FOUND,
        ErrorKind::IllegalTransition
        | ErrorKind::ConcurrentModification
        | ErrorKind::ScheduleConflict
        | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::NotificationFailed => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(error: CoordinationError) -> Response {
    let kind = error.kind();
    let payload = json!({
        "error": error.to_string(),
        "kind": kind.code(),
        "action": kind.action(),
    });
    (status_for(kind), Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, CoordinationError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn register_worker<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Json(registration): Json<WorkerRegistration>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::RegisterWorker) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.register_worker(registration, role.label(), now()),
    )
}

pub(crate) async fn fetch_worker<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(worker_id): Path<String>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = authorize(&headers, Capability::ViewWorker) {
        return response;
    }
    respond(StatusCode::OK, service.worker(&WorkerId(worker_id)))
}

pub(crate) async fn upload_document<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(worker_id): Path<String>,
    Json(upload): Json<DocumentUpload>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::UploadDocument) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.upload_document(&WorkerId(worker_id), upload, role.label(), now()),
    )
}

pub(crate) async fn verify_document<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path((worker_id, document_id)): Path<(String, String)>,
    Json(decision): Json<VerificationDecision>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::VerifyDocument) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.verify_document(
            &WorkerId(worker_id),
            &DocumentId(document_id),
            decision.status,
            role.label(),
            now(),
        ),
    )
}

pub(crate) async fn compliance_alerts<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Query(query): Query<AsOfDate>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = authorize(&headers, Capability::ViewComplianceAlerts) {
        return response;
    }
    let as_of = query.as_of.unwrap_or_else(|| now().date());
    match service.compliance_alerts(as_of) {
        Ok(alerts) => {
            let payload = json!({
                "as_of": as_of,
                "alerts": alerts,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_request<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Json(submission): Json<RequestSubmission>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::SubmitRequest) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.submit_request(submission, role.label(), now()),
    )
}

pub(crate) async fn fetch_request<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = authorize(&headers, Capability::ViewRequest) {
        return response;
    }
    respond(
        StatusCode::OK,
        service.request(&ServiceRequestId(request_id)),
    )
}

pub(crate) async fn review_request<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::ReviewRequest) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.begin_review(&ServiceRequestId(request_id), role.label(), now()),
    )
}

pub(crate) async fn candidates<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = authorize(&headers, Capability::ViewCandidates) {
        return response;
    }
    match service.candidates(&ServiceRequestId(request_id), now()) {
        Ok(search @ CandidateSearch::Ranked { .. }) => {
            (StatusCode::OK, Json(search)).into_response()
        }
        Ok(CandidateSearch::NoEligibleWorker {
            request_id,
            excluded,
        }) => {
            let payload = json!({
                "outcome": ErrorKind::NoEligibleWorker.code(),
                "request_id": request_id,
                "candidates": [],
                "excluded": excluded,
                "action": ErrorKind::NoEligibleWorker.action(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn assign_worker<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    Json(command): Json<AssignCommand>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::AssignWorker) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.assign(&ServiceRequestId(request_id), command, role.label(), now()),
    )
}

pub(crate) async fn auto_assign<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    Json(body): Json<ExpectedStatus>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::AssignWorker) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.assign_best_match(
            &ServiceRequestId(request_id),
            body.expected_status,
            role.label(),
            now(),
        ),
    )
}

pub(crate) async fn confirm_request<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::ConfirmRequest) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.confirm(&ServiceRequestId(request_id), role.label(), now()),
    )
}

pub(crate) async fn cancel_request<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::CancelRequest) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.cancel(&ServiceRequestId(request_id), role.label(), now()),
    )
}

pub(crate) async fn active_assignments<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = authorize(&headers, Capability::ViewAssignments) {
        return response;
    }
    respond(StatusCode::OK, service.active_assignments())
}

pub(crate) async fn submit_timesheet<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Json(submission): Json<TimesheetSubmission>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::SubmitTimesheet) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.submit_timesheet(submission, role.label(), now()),
    )
}

pub(crate) async fn approve_timesheet<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(timesheet_id): Path<String>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::DecideTimesheet) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.approve_timesheet(&TimesheetId(timesheet_id), role.label(), now()),
    )
}

pub(crate) async fn reject_timesheet<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Path(timesheet_id): Path<String>,
    Json(body): Json<RejectionBody>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let role = match authorize(&headers, Capability::DecideTimesheet) {
        Ok(role) => role,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.reject_timesheet(
            &TimesheetId(timesheet_id),
            &body.reason,
            role.label(),
            now(),
        ),
    )
}

pub(crate) async fn pay_quote<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Json(quote): Json<PayQuote>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = authorize(&headers, Capability::QuotePay) {
        return response;
    }
    respond(StatusCode::OK, service.pay_quote(&quote))
}

pub(crate) async fn run_completions<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
    Query(query): Query<AsOfInstant>,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = authorize(&headers, Capability::RunCompletions) {
        return response;
    }
    let as_of = completion_cutoff(query.as_of, now());
    match service.complete_due(as_of, "system") {
        Ok(completed) => {
            let payload = json!({
                "as_of": as_of,
                "completed": completed,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn ledger_events<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = authorize(&headers, Capability::ViewLedger) {
        return response;
    }
    respond(StatusCode::OK, service.events())
}

pub(crate) async fn invoices<R, N>(
    State(service): State<SharedService<R, N>>,
    headers: HeaderMap,
) -> Response
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = authorize(&headers, Capability::ViewInvoices) {
        return response;
    }
    respond(StatusCode::OK, service.invoices())
}
