use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::domain::{
    Assignment, AssignmentId, ComplianceDocument, DocumentId, ServiceRequest, ServiceRequestId,
    ServiceRequestStatus, Timesheet, TimesheetId, TimesheetStatus, VerificationStatus, Worker,
    WorkerId,
};
use super::ledger::{Invoice, LedgerEvent, LedgerEventKind};

/// Storage abstraction for workers, requests, assignments, timesheets, invoices, and the
/// audit trail.
///
/// Every status-changing method is a compare-and-set: it succeeds only while the stored status
/// still equals `expected`, and otherwise fails with [`RepositoryError::ConcurrentModification`]
/// without touching any record.
pub trait CoordinationRepository: Send + Sync {
    fn insert_worker(&self, worker: Worker) -> Result<Worker, RepositoryError>;
    /// Appends a document to the worker's record; existing documents are never replaced.
    fn append_document(
        &self,
        worker_id: &WorkerId,
        document: ComplianceDocument,
    ) -> Result<ComplianceDocument, RepositoryError>;
    fn verify_document(
        &self,
        worker_id: &WorkerId,
        document_id: &DocumentId,
        expected: VerificationStatus,
        next: VerificationStatus,
    ) -> Result<ComplianceDocument, RepositoryError>;
    fn fetch_worker(&self, id: &WorkerId) -> Result<Option<Worker>, RepositoryError>;
    fn workers(&self) -> Result<Vec<Worker>, RepositoryError>;

    fn insert_request(&self, request: ServiceRequest) -> Result<ServiceRequest, RepositoryError>;
    fn fetch_request(
        &self,
        id: &ServiceRequestId,
    ) -> Result<Option<ServiceRequest>, RepositoryError>;
    fn requests(
        &self,
        status: Option<ServiceRequestStatus>,
    ) -> Result<Vec<ServiceRequest>, RepositoryError>;
    fn transition_request(
        &self,
        id: &ServiceRequestId,
        expected: ServiceRequestStatus,
        next: ServiceRequestStatus,
    ) -> Result<ServiceRequest, RepositoryError>;
    /// Moves the request to `assigned` and records the assignment in one step. Fails with
    /// `ScheduleConflict` when the worker already holds an active assignment whose request
    /// window overlaps this one.
    fn assign(
        &self,
        id: &ServiceRequestId,
        expected: ServiceRequestStatus,
        assignment: Assignment,
    ) -> Result<ServiceRequest, RepositoryError>;
    /// Cancels the request and voids its active assignment, if any, in one step.
    fn cancel_request(
        &self,
        id: &ServiceRequestId,
        expected: ServiceRequestStatus,
        at: NaiveDateTime,
    ) -> Result<(ServiceRequest, Option<Assignment>), RepositoryError>;

    fn fetch_assignment(&self, id: &AssignmentId) -> Result<Option<Assignment>, RepositoryError>;
    fn assignments_for_request(
        &self,
        id: &ServiceRequestId,
    ) -> Result<Vec<Assignment>, RepositoryError>;
    fn active_assignments(&self) -> Result<Vec<Assignment>, RepositoryError>;

    /// Rejects the insert with `Conflict` while another timesheet for the same assignment is
    /// still submitted or already approved.
    fn insert_timesheet(&self, timesheet: Timesheet) -> Result<Timesheet, RepositoryError>;
    fn fetch_timesheet(&self, id: &TimesheetId) -> Result<Option<Timesheet>, RepositoryError>;
    fn timesheets_for_assignment(
        &self,
        id: &AssignmentId,
    ) -> Result<Vec<Timesheet>, RepositoryError>;
    fn transition_timesheet(
        &self,
        id: &TimesheetId,
        expected: TimesheetStatus,
        next: TimesheetStatus,
    ) -> Result<Timesheet, RepositoryError>;

    /// Approves the invoiced timesheet and stores the invoice in one step. Nothing changes
    /// unless the timesheet is still `expected` on an active assignment with no invoice yet.
    fn approve_timesheet(
        &self,
        expected: TimesheetStatus,
        invoice: Invoice,
    ) -> Result<(Timesheet, Invoice), RepositoryError>;
    fn invoices(&self) -> Result<Vec<Invoice>, RepositoryError>;

    fn append_event(
        &self,
        actor: &str,
        at: NaiveDateTime,
        kind: LedgerEventKind,
    ) -> Result<LedgerEvent, RepositoryError>;
    fn events(&self) -> Result<Vec<LedgerEvent>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("{entity} {id} was modified concurrently (expected {expected}, found {found})")]
    ConcurrentModification {
        entity: &'static str,
        id: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("worker {worker_id} already holds overlapping assignment {assignment_id}")]
    ScheduleConflict {
        worker_id: WorkerId,
        assignment_id: AssignmentId,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for worker/participant notifications (e-mail, SMS, push adapters).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub recipient: String,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
