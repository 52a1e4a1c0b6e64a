use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::coordination::{
    AssignCommand, Assignment, AssignmentId, AssignmentStatus, CompliancePolicy,
    ComplianceDocument, CoordinationConfig, CoordinationService, DocumentId, DocumentType,
    DocumentUpload, GeoPoint, InMemoryCoordinationStore, InMemoryNotifier, Notification,
    NotificationError, NotificationPublisher, ParticipantId, RateSchedule, RateTable,
    RequestSubmission, ServiceCategory, ServiceRequest, ServiceRequestId, ServiceRequestStatus,
    TimeWindow, Timesheet, TimesheetId, TimesheetStatus, TimesheetSubmission, Urgency,
    VerificationStatus, Worker, WorkerId, WorkerRegistration, ROLE_HEADER,
};

pub(super) type TestService = CoordinationService<InMemoryCoordinationStore, InMemoryNotifier>;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    date(year, month, day).and_time(time(hour, minute))
}

/// Monday 2 March 2026, the reference "today" for service tests.
pub(super) fn as_of() -> NaiveDate {
    date(2026, 3, 2)
}

pub(super) fn now() -> NaiveDateTime {
    at(2026, 3, 2, 9, 0)
}

pub(super) fn cbd() -> GeoPoint {
    GeoPoint::new(-37.8136, 144.9631)
}

/// Roughly 1.5 km north of the CBD.
pub(super) fn carlton() -> GeoPoint {
    GeoPoint::new(-37.8001, 144.9671)
}

/// Roughly 8 km south-east of the CBD.
pub(super) fn caulfield() -> GeoPoint {
    GeoPoint::new(-37.8770, 145.0227)
}

/// Roughly 65 km south-west of the CBD.
pub(super) fn geelong() -> GeoPoint {
    GeoPoint::new(-38.1499, 144.3617)
}

/// Wednesday 4 March 2026, 09:00 to 12:00.
pub(super) fn service_window() -> TimeWindow {
    TimeWindow::new(at(2026, 3, 4, 9, 0), at(2026, 3, 4, 12, 0))
}

pub(super) fn document(
    holder: &WorkerId,
    document_type: DocumentType,
    issued: NaiveDate,
    expiry: Option<NaiveDate>,
    status: VerificationStatus,
) -> ComplianceDocument {
    ComplianceDocument {
        id: DocumentId(format!("{holder}-{document_type:?}-{issued}")),
        document_type,
        holder_id: holder.clone(),
        issued_date: issued,
        expiry_date: expiry,
        verification_status: status,
        uploaded_at: issued.and_time(time(10, 0)),
    }
}

/// Approved, long-dated documents for everything mandated by `categories`.
pub(super) fn compliant_documents(
    holder: &WorkerId,
    categories: &[ServiceCategory],
) -> Vec<ComplianceDocument> {
    CompliancePolicy::default()
        .mandated_for(categories.iter())
        .into_iter()
        .map(|document_type| {
            document(
                holder,
                document_type,
                date(2024, 1, 15),
                Some(date(2030, 1, 15)),
                VerificationStatus::Approved,
            )
        })
        .collect()
}

pub(super) fn worker(id: &str, location: GeoPoint) -> Worker {
    let worker_id = WorkerId(id.to_string());
    Worker {
        documents: compliant_documents(&worker_id, &[ServiceCategory::PersonalCare]),
        id: worker_id,
        name: format!("Worker {id}"),
        location,
        hourly_rate: Decimal::new(4200, 2),
        classification: "scs_level_2".to_string(),
        working_radius_km: 25.0,
        specializations: BTreeSet::from([ServiceCategory::PersonalCare]),
        availability: vec![TimeWindow::new(at(2026, 3, 4, 8, 0), at(2026, 3, 4, 13, 0))],
        ratings: vec![4.0, 5.0],
        registered_at: at(2025, 1, 10, 9, 0),
    }
}

pub(super) fn request() -> ServiceRequest {
    ServiceRequest {
        id: ServiceRequestId("req-test".to_string()),
        participant_id: ParticipantId("ndis-430001".to_string()),
        category: ServiceCategory::PersonalCare,
        required_specializations: BTreeSet::from([ServiceCategory::PersonalCare]),
        location: carlton(),
        preferred_window: service_window(),
        urgency: Urgency::High,
        status: ServiceRequestStatus::Submitted,
        submitted_at: now(),
    }
}

pub(super) fn assignment(id: &str, request: &ServiceRequest, worker_id: &WorkerId) -> Assignment {
    Assignment {
        id: AssignmentId(id.to_string()),
        service_request_id: request.id.clone(),
        worker_id: worker_id.clone(),
        assigned_at: now(),
        assigned_by: "admin".to_string(),
        match_score_at_assignment: 80.0,
        status: AssignmentStatus::Active,
        voided_at: None,
    }
}

pub(super) fn timesheet(start: NaiveDateTime, end: NaiveTime) -> Timesheet {
    Timesheet {
        id: TimesheetId("ts-test".to_string()),
        assignment_id: AssignmentId("asg-test".to_string()),
        date: start.date(),
        start_time: start.time(),
        end_time: end,
        ends_next_day: false,
        break_minutes: 0,
        travel_minutes: 0,
        travel_kilometres: None,
        notes: String::new(),
        status: TimesheetStatus::Submitted,
        supersedes: None,
        submitted_at: start,
    }
}

pub(super) fn rate_schedule() -> RateSchedule {
    RateSchedule::single(RateTable::schads_standard(date(2025, 7, 1)))
}

pub(super) fn build_service() -> (Arc<TestService>, InMemoryCoordinationStore, InMemoryNotifier) {
    let store = InMemoryCoordinationStore::default();
    let notifier = InMemoryNotifier::default();
    let service = Arc::new(CoordinationService::new(
        Arc::new(store.clone()),
        Arc::new(notifier.clone()),
        CoordinationConfig::default(),
        rate_schedule(),
    ));
    (service, store, notifier)
}

pub(super) fn registration(name: &str, location: GeoPoint) -> WorkerRegistration {
    WorkerRegistration {
        name: name.to_string(),
        location,
        hourly_rate: Decimal::new(4200, 2),
        classification: "scs_level_2".to_string(),
        working_radius_km: 25.0,
        specializations: BTreeSet::from([ServiceCategory::PersonalCare]),
        availability: vec![TimeWindow::new(at(2026, 3, 4, 8, 0), at(2026, 3, 4, 13, 0))],
        ratings: vec![4.5],
    }
}

/// Registers a worker and uploads and approves every personal care credential.
pub(super) fn onboard(service: &TestService, name: &str, location: GeoPoint) -> Worker {
    let worker = service
        .register_worker(registration(name, location), "admin", now())
        .expect("worker registers");

    for document_type in service
        .policy()
        .mandated_for([ServiceCategory::PersonalCare].iter())
    {
        let document = service
            .upload_document(
                &worker.id,
                DocumentUpload {
                    document_type,
                    issued_date: date(2024, 1, 15),
                    expiry_date: Some(date(2099, 12, 31)),
                    holder_id: None,
                },
                "support_worker",
                now(),
            )
            .expect("document uploads");
        service
            .verify_document(
                &worker.id,
                &document.id,
                VerificationStatus::Approved,
                "compliance",
                now(),
            )
            .expect("document verifies");
    }

    service.worker(&worker.id).expect("worker stored")
}

pub(super) fn submission() -> RequestSubmission {
    RequestSubmission {
        participant_id: ParticipantId("ndis-430001".to_string()),
        category: ServiceCategory::PersonalCare,
        required_specializations: BTreeSet::from([ServiceCategory::PersonalCare]),
        location: carlton(),
        preferred_window: service_window(),
        urgency: Urgency::High,
    }
}

pub(super) fn timesheet_submission(assignment_id: &AssignmentId) -> TimesheetSubmission {
    TimesheetSubmission {
        assignment_id: assignment_id.clone(),
        date: date(2026, 3, 4),
        start_time: time(9, 0),
        end_time: time(12, 0),
        ends_next_day: false,
        break_minutes: 0,
        travel_minutes: 0,
        travel_kilometres: None,
        notes: "Morning routine".to_string(),
        supersedes: None,
    }
}

/// Submitted, assigned, and confirmed request with its onboarded worker.
pub(super) fn confirmed_assignment(
    service: &TestService,
) -> (ServiceRequest, Worker, Assignment) {
    let worker = onboard(service, "Ava Nguyen", cbd());
    let request = service
        .submit_request(submission(), "participant", now())
        .expect("request submits");
    let assignment = service
        .assign(
            &request.id,
            AssignCommand {
                worker_id: worker.id.clone(),
                expected_status: ServiceRequestStatus::Submitted,
            },
            "admin",
            now(),
        )
        .expect("worker assigns");
    let request = service
        .confirm(&request.id, "admin", now())
        .expect("request confirms");
    (request, worker, assignment)
}

/// Publisher whose transport is always down.
#[derive(Debug, Default)]
pub(super) struct OfflineNotifier;

impl NotificationPublisher for OfflineNotifier {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) fn json_request(
    method: Method,
    uri: &str,
    role: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder.header(ROLE_HEADER, role);
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).expect("serialize body"))
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 256)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
