use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;

use super::domain::{
    Assignment, AssignmentId, AssignmentStatus, ComplianceDocument, DocumentId, ServiceRequest,
    ServiceRequestId, ServiceRequestStatus, Timesheet, TimesheetId, TimesheetStatus,
    VerificationStatus, Worker, WorkerId,
};
use super::ledger::{Invoice, LedgerEvent, LedgerEventKind};
use super::repository::{
    CoordinationRepository, Notification, NotificationError, NotificationPublisher,
    RepositoryError,
};

#[derive(Debug, Default)]
struct StoreState {
    workers: BTreeMap<WorkerId, Worker>,
    requests: BTreeMap<ServiceRequestId, ServiceRequest>,
    assignments: BTreeMap<AssignmentId, Assignment>,
    timesheets: BTreeMap<TimesheetId, Timesheet>,
    invoices: Vec<Invoice>,
    events: Vec<LedgerEvent>,
}

/// Mutex-backed store. Each trait call holds the lock for its whole read-check-write, which is
/// what makes the compare-and-set methods atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCoordinationStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryCoordinationStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

fn request_mismatch(
    request: &ServiceRequest,
    expected: ServiceRequestStatus,
) -> Result<(), RepositoryError> {
    if request.status == expected {
        Ok(())
    } else {
        Err(RepositoryError::ConcurrentModification {
            entity: "service request",
            id: request.id.to_string(),
            expected: expected.label(),
            found: request.status.label(),
        })
    }
}

impl CoordinationRepository for InMemoryCoordinationStore {
    fn insert_worker(&self, worker: Worker) -> Result<Worker, RepositoryError> {
        let mut state = self.lock()?;
        if state.workers.contains_key(&worker.id) {
            return Err(RepositoryError::Conflict);
        }
        state.workers.insert(worker.id.clone(), worker.clone());
        Ok(worker)
    }

    fn append_document(
        &self,
        worker_id: &WorkerId,
        document: ComplianceDocument,
    ) -> Result<ComplianceDocument, RepositoryError> {
        let mut state = self.lock()?;
        let worker = state
            .workers
            .get_mut(worker_id)
            .ok_or(RepositoryError::NotFound)?;
        if worker.document(&document.id).is_some() {
            return Err(RepositoryError::Conflict);
        }
        worker.documents.push(document.clone());
        Ok(document)
    }

    fn verify_document(
        &self,
        worker_id: &WorkerId,
        document_id: &DocumentId,
        expected: VerificationStatus,
        next: VerificationStatus,
    ) -> Result<ComplianceDocument, RepositoryError> {
        let mut state = self.lock()?;
        let document = state
            .workers
            .get_mut(worker_id)
            .and_then(|worker| {
                worker
                    .documents
                    .iter_mut()
                    .find(|document| document.id == *document_id)
            })
            .ok_or(RepositoryError::NotFound)?;
        if document.verification_status != expected {
            return Err(RepositoryError::ConcurrentModification {
                entity: "compliance document",
                id: document_id.to_string(),
                expected: expected.label(),
                found: document.verification_status.label(),
            });
        }
        document.verification_status = next;
        Ok(document.clone())
    }

    fn fetch_worker(&self, id: &WorkerId) -> Result<Option<Worker>, RepositoryError> {
        Ok(self.lock()?.workers.get(id).cloned())
    }

    fn workers(&self) -> Result<Vec<Worker>, RepositoryError> {
        Ok(self.lock()?.workers.values().cloned().collect())
    }

    fn insert_request(&self, request: ServiceRequest) -> Result<ServiceRequest, RepositoryError> {
        let mut state = self.lock()?;
        if state.requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        state.requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn fetch_request(
        &self,
        id: &ServiceRequestId,
    ) -> Result<Option<ServiceRequest>, RepositoryError> {
        Ok(self.lock()?.requests.get(id).cloned())
    }

    fn requests(
        &self,
        status: Option<ServiceRequestStatus>,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        Ok(self
            .lock()?
            .requests
            .values()
            .filter(|request| status.map(|s| request.status == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn transition_request(
        &self,
        id: &ServiceRequestId,
        expected: ServiceRequestStatus,
        next: ServiceRequestStatus,
    ) -> Result<ServiceRequest, RepositoryError> {
        let mut state = self.lock()?;
        let request = state.requests.get_mut(id).ok_or(RepositoryError::NotFound)?;
        request_mismatch(request, expected)?;
        request.status = next;
        Ok(request.clone())
    }

    fn assign(
        &self,
        id: &ServiceRequestId,
        expected: ServiceRequestStatus,
        assignment: Assignment,
    ) -> Result<ServiceRequest, RepositoryError> {
        let mut state = self.lock()?;
        let window = {
            let request = state.requests.get(id).ok_or(RepositoryError::NotFound)?;
            request_mismatch(request, expected)?;
            request.preferred_window
        };

        let clash = state.assignments.values().find(|existing| {
            existing.is_active()
                && existing.worker_id == assignment.worker_id
                && state
                    .requests
                    .get(&existing.service_request_id)
                    .map(|other| {
                        !other.status.is_terminal() && other.preferred_window.overlaps(&window)
                    })
                    .unwrap_or(false)
        });
        if let Some(existing) = clash {
            return Err(RepositoryError::ScheduleConflict {
                worker_id: assignment.worker_id.clone(),
                assignment_id: existing.id.clone(),
            });
        }

        if state.assignments.contains_key(&assignment.id) {
            return Err(RepositoryError::Conflict);
        }
        state
            .assignments
            .insert(assignment.id.clone(), assignment);

        let request = state.requests.get_mut(id).ok_or(RepositoryError::NotFound)?;
        request.status = ServiceRequestStatus::Assigned;
        Ok(request.clone())
    }

    fn cancel_request(
        &self,
        id: &ServiceRequestId,
        expected: ServiceRequestStatus,
        at: NaiveDateTime,
    ) -> Result<(ServiceRequest, Option<Assignment>), RepositoryError> {
        let mut state = self.lock()?;
        let request = state.requests.get_mut(id).ok_or(RepositoryError::NotFound)?;
        request_mismatch(request, expected)?;
        request.status = ServiceRequestStatus::Cancelled;
        let request = request.clone();

        let voided = state
            .assignments
            .values_mut()
            .find(|assignment| assignment.service_request_id == *id && assignment.is_active())
            .map(|assignment| {
                assignment.status = AssignmentStatus::Voided;
                assignment.voided_at = Some(at);
                assignment.clone()
            });

        Ok((request, voided))
    }

    fn fetch_assignment(&self, id: &AssignmentId) -> Result<Option<Assignment>, RepositoryError> {
        Ok(self.lock()?.assignments.get(id).cloned())
    }

    fn assignments_for_request(
        &self,
        id: &ServiceRequestId,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        Ok(self
            .lock()?
            .assignments
            .values()
            .filter(|assignment| assignment.service_request_id == *id)
            .cloned()
            .collect())
    }

    fn active_assignments(&self) -> Result<Vec<Assignment>, RepositoryError> {
        Ok(self
            .lock()?
            .assignments
            .values()
            .filter(|assignment| assignment.is_active())
            .cloned()
            .collect())
    }

    fn insert_timesheet(&self, timesheet: Timesheet) -> Result<Timesheet, RepositoryError> {
        let mut state = self.lock()?;
        if state.timesheets.contains_key(&timesheet.id) {
            return Err(RepositoryError::Conflict);
        }
        let open = state.timesheets.values().any(|existing| {
            existing.assignment_id == timesheet.assignment_id
                && existing.status != TimesheetStatus::Rejected
        });
        if open {
            return Err(RepositoryError::Conflict);
        }
        state
            .timesheets
            .insert(timesheet.id.clone(), timesheet.clone());
        Ok(timesheet)
    }

    fn fetch_timesheet(&self, id: &TimesheetId) -> Result<Option<Timesheet>, RepositoryError> {
        Ok(self.lock()?.timesheets.get(id).cloned())
    }

    fn timesheets_for_assignment(
        &self,
        id: &AssignmentId,
    ) -> Result<Vec<Timesheet>, RepositoryError> {
        let mut timesheets: Vec<Timesheet> = self
            .lock()?
            .timesheets
            .values()
            .filter(|timesheet| timesheet.assignment_id == *id)
            .cloned()
            .collect();
        timesheets.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(timesheets)
    }

    fn transition_timesheet(
        &self,
        id: &TimesheetId,
        expected: TimesheetStatus,
        next: TimesheetStatus,
    ) -> Result<Timesheet, RepositoryError> {
        let mut state = self.lock()?;
        let timesheet = state
            .timesheets
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        if timesheet.status != expected {
            return Err(RepositoryError::ConcurrentModification {
                entity: "timesheet",
                id: id.to_string(),
                expected: expected.label(),
                found: timesheet.status.label(),
            });
        }
        timesheet.status = next;
        Ok(timesheet.clone())
    }

    fn approve_timesheet(
        &self,
        expected: TimesheetStatus,
        invoice: Invoice,
    ) -> Result<(Timesheet, Invoice), RepositoryError> {
        let mut state = self.lock()?;
        if state.invoices.iter().any(|existing| {
            existing.id == invoice.id || existing.timesheet_id == invoice.timesheet_id
        }) {
            return Err(RepositoryError::Conflict);
        }

        let assignment = state
            .assignments
            .get(&invoice.assignment_id)
            .ok_or(RepositoryError::NotFound)?;
        if !assignment.is_active() {
            return Err(RepositoryError::ConcurrentModification {
                entity: "assignment",
                id: assignment.id.to_string(),
                expected: AssignmentStatus::Active.label(),
                found: assignment.status.label(),
            });
        }

        let timesheet = state
            .timesheets
            .get_mut(&invoice.timesheet_id)
            .ok_or(RepositoryError::NotFound)?;
        if timesheet.status != expected {
            return Err(RepositoryError::ConcurrentModification {
                entity: "timesheet",
                id: timesheet.id.to_string(),
                expected: expected.label(),
                found: timesheet.status.label(),
            });
        }
        timesheet.status = TimesheetStatus::Approved;
        let approved = timesheet.clone();

        state.invoices.push(invoice.clone());
        Ok((approved, invoice))
    }

    fn invoices(&self) -> Result<Vec<Invoice>, RepositoryError> {
        Ok(self.lock()?.invoices.clone())
    }

    fn append_event(
        &self,
        actor: &str,
        at: NaiveDateTime,
        kind: LedgerEventKind,
    ) -> Result<LedgerEvent, RepositoryError> {
        let mut state = self.lock()?;
        let event = LedgerEvent {
            sequence: state.events.len() as u64 + 1,
            recorded_at: at,
            actor: actor.to_string(),
            kind,
        };
        state.events.push(event.clone());
        Ok(event)
    }

    fn events(&self) -> Result<Vec<LedgerEvent>, RepositoryError> {
        Ok(self.lock()?.events.clone())
    }
}

/// Publisher that records notifications instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl NotificationPublisher for InMemoryNotifier {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .map_err(|_| NotificationError::Transport("notifier mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
