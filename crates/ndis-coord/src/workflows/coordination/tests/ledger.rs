use rust_decimal::Decimal;

use super::common::*;
use crate::workflows::coordination::{
    AssignmentStatus, CoordinationRepository, DocumentType, InMemoryCoordinationStore, Invoice,
    InvoiceId, LedgerEventKind, PayBreakdown, RepositoryError, ServiceRequestId,
    ServiceRequestStatus, TimeWindow, Timesheet, TimesheetId, TimesheetStatus,
    VerificationStatus,
};

#[test]
fn request_lifecycle_only_moves_forward() {
    use ServiceRequestStatus::*;

    assert!(Submitted.can_transition_to(UnderReview));
    assert!(Submitted.can_transition_to(Assigned));
    assert!(UnderReview.can_transition_to(Assigned));
    assert!(Assigned.can_transition_to(Confirmed));
    assert!(Confirmed.can_transition_to(Completed));
    assert!(Confirmed.can_transition_to(Cancelled));

    assert!(!Assigned.can_transition_to(Submitted));
    assert!(!Confirmed.can_transition_to(Assigned));
    assert!(!Submitted.can_transition_to(Confirmed));
    assert!(!Completed.can_transition_to(Cancelled));
    assert!(!Cancelled.can_transition_to(Submitted));
    assert!(Completed.is_terminal() && Cancelled.is_terminal());
}

#[test]
fn timesheet_and_document_decisions_happen_once() {
    assert!(TimesheetStatus::Submitted.can_transition_to(TimesheetStatus::Approved));
    assert!(TimesheetStatus::Submitted.can_transition_to(TimesheetStatus::Rejected));
    assert!(!TimesheetStatus::Rejected.can_transition_to(TimesheetStatus::Approved));
    assert!(!TimesheetStatus::Approved.can_transition_to(TimesheetStatus::Rejected));

    assert!(VerificationStatus::Pending.can_transition_to(VerificationStatus::Approved));
    assert!(!VerificationStatus::Approved.can_transition_to(VerificationStatus::Rejected));
    assert!(!VerificationStatus::Rejected.can_transition_to(VerificationStatus::Pending));
}

fn seeded_store() -> InMemoryCoordinationStore {
    let store = InMemoryCoordinationStore::default();
    store
        .insert_worker(worker("wkr-a", cbd()))
        .expect("worker inserts");
    store.insert_request(request()).expect("request inserts");
    store
}

#[test]
fn assign_is_compare_and_set_on_request_status() {
    let store = seeded_store();
    let request = request();
    let worker_id = worker("wkr-a", cbd()).id;

    let stale = store
        .assign(
            &request.id,
            ServiceRequestStatus::UnderReview,
            assignment("asg-1", &request, &worker_id),
        )
        .expect_err("stale expected status");
    assert_eq!(
        stale,
        RepositoryError::ConcurrentModification {
            entity: "service request",
            id: "req-test".to_string(),
            expected: "under_review",
            found: "submitted",
        }
    );
    assert!(store.active_assignments().expect("read").is_empty());

    let assigned = store
        .assign(
            &request.id,
            ServiceRequestStatus::Submitted,
            assignment("asg-1", &request, &worker_id),
        )
        .expect("assign succeeds");
    assert_eq!(assigned.status, ServiceRequestStatus::Assigned);
    assert_eq!(store.active_assignments().expect("read").len(), 1);
}

#[test]
fn overlapping_assignment_for_same_worker_is_a_schedule_conflict() {
    let store = seeded_store();
    let first = request();
    let worker_id = worker("wkr-a", cbd()).id;
    store
        .assign(
            &first.id,
            ServiceRequestStatus::Submitted,
            assignment("asg-1", &first, &worker_id),
        )
        .expect("first assignment");

    let mut second = request();
    second.id = ServiceRequestId("req-overlap".to_string());
    second.preferred_window = TimeWindow::new(at(2026, 3, 4, 11, 0), at(2026, 3, 4, 14, 0));
    store.insert_request(second.clone()).expect("insert");

    let clash = store
        .assign(
            &second.id,
            ServiceRequestStatus::Submitted,
            assignment("asg-2", &second, &worker_id),
        )
        .expect_err("overlap");
    assert!(matches!(clash, RepositoryError::ScheduleConflict { .. }));

    let mut later = request();
    later.id = ServiceRequestId("req-later".to_string());
    later.preferred_window = TimeWindow::new(at(2026, 3, 4, 12, 0), at(2026, 3, 4, 14, 0));
    store.insert_request(later.clone()).expect("insert");
    store
        .assign(
            &later.id,
            ServiceRequestStatus::Submitted,
            assignment("asg-3", &later, &worker_id),
        )
        .expect("back-to-back windows do not overlap");
}

#[test]
fn cancellation_voids_the_active_assignment() {
    let store = seeded_store();
    let request = request();
    let worker_id = worker("wkr-a", cbd()).id;
    store
        .assign(
            &request.id,
            ServiceRequestStatus::Submitted,
            assignment("asg-1", &request, &worker_id),
        )
        .expect("assign");

    let (cancelled, voided) = store
        .cancel_request(&request.id, ServiceRequestStatus::Assigned, now())
        .expect("cancel");
    assert_eq!(cancelled.status, ServiceRequestStatus::Cancelled);
    let voided = voided.expect("assignment voided");
    assert_eq!(voided.status, AssignmentStatus::Voided);
    assert_eq!(voided.voided_at, Some(now()));
    assert!(store.active_assignments().expect("read").is_empty());

    let history = store.assignments_for_request(&request.id).expect("read");
    assert_eq!(history.len(), 1, "voided assignments are kept");
}

fn invoice(id: &str, timesheet: &Timesheet, request: &ServiceRequestId) -> Invoice {
    Invoice {
        id: InvoiceId(id.to_string()),
        timesheet_id: timesheet.id.clone(),
        assignment_id: timesheet.assignment_id.clone(),
        service_request_id: request.clone(),
        participant_id: super::common::request().participant_id,
        worker_id: worker("wkr-a", cbd()).id,
        breakdown: PayBreakdown {
            classification: "scs_level_2".to_string(),
            base_rate: Decimal::new(4550, 2),
            billable_hours: Decimal::new(3, 0),
            base_amount: Decimal::new(13650, 2),
            penalties: Vec::new(),
            allowances: Vec::new(),
            total: Decimal::new(13650, 2),
            rate_table_effective_from: date(2025, 7, 1),
        },
        issued_at: now(),
    }
}

/// Store with `asg-test` active on the seeded request and its timesheet submitted.
fn store_with_open_timesheet() -> (InMemoryCoordinationStore, Timesheet) {
    let store = seeded_store();
    let request = request();
    store
        .assign(
            &request.id,
            ServiceRequestStatus::Submitted,
            assignment("asg-test", &request, &worker("wkr-a", cbd()).id),
        )
        .expect("assign");
    let open = timesheet(at(2026, 3, 4, 9, 0), time(12, 0));
    store.insert_timesheet(open.clone()).expect("insert");
    (store, open)
}

#[test]
fn approval_and_invoice_commit_together() {
    let (store, open) = store_with_open_timesheet();
    let request_id = request().id;

    let (approved, issued) = store
        .approve_timesheet(TimesheetStatus::Submitted, invoice("inv-1", &open, &request_id))
        .expect("approve");
    assert_eq!(approved.status, TimesheetStatus::Approved);
    assert_eq!(issued.id, InvoiceId("inv-1".to_string()));

    let again = store
        .approve_timesheet(TimesheetStatus::Submitted, invoice("inv-2", &open, &request_id))
        .expect_err("already invoiced");
    assert_eq!(again, RepositoryError::Conflict);
    assert_eq!(store.invoices().expect("read").len(), 1);
}

#[test]
fn voided_assignment_leaves_timesheet_unapproved_and_uninvoiced() {
    let (store, open) = store_with_open_timesheet();
    let request_id = request().id;
    store
        .cancel_request(&request_id, ServiceRequestStatus::Assigned, now())
        .expect("cancel");

    let error = store
        .approve_timesheet(TimesheetStatus::Submitted, invoice("inv-1", &open, &request_id))
        .expect_err("assignment voided");
    assert!(matches!(
        error,
        RepositoryError::ConcurrentModification {
            entity: "assignment",
            expected: "active",
            found: "voided",
            ..
        }
    ));
    assert!(store.invoices().expect("read").is_empty());
    let stored = store
        .fetch_timesheet(&open.id)
        .expect("read")
        .expect("timesheet kept");
    assert_eq!(stored.status, TimesheetStatus::Submitted);
}

#[test]
fn only_one_open_timesheet_per_assignment() {
    let store = InMemoryCoordinationStore::default();
    let first = timesheet(at(2026, 3, 4, 9, 0), time(12, 0));
    store.insert_timesheet(first.clone()).expect("insert");

    let mut duplicate = first.clone();
    duplicate.id = TimesheetId("ts-second".to_string());
    assert_eq!(
        store.insert_timesheet(duplicate.clone()),
        Err(RepositoryError::Conflict)
    );

    store
        .transition_timesheet(&first.id, TimesheetStatus::Submitted, TimesheetStatus::Rejected)
        .expect("reject");
    duplicate.supersedes = Some(first.id.clone());
    store
        .insert_timesheet(duplicate)
        .expect("resubmission after rejection");

    let stale = store
        .transition_timesheet(&first.id, TimesheetStatus::Submitted, TimesheetStatus::Approved)
        .expect_err("already decided");
    assert!(matches!(
        stale,
        RepositoryError::ConcurrentModification {
            entity: "timesheet",
            found: "rejected",
            ..
        }
    ));
}

#[test]
fn document_verification_is_compare_and_set() {
    let store = InMemoryCoordinationStore::default();
    let mut holder = worker("wkr-docs", cbd());
    holder.documents.clear();
    store.insert_worker(holder.clone()).expect("insert");

    let pending = document(
        &holder.id,
        DocumentType::FirstAid,
        date(2026, 2, 1),
        Some(date(2029, 2, 1)),
        VerificationStatus::Pending,
    );
    store
        .append_document(&holder.id, pending.clone())
        .expect("append");
    assert_eq!(
        store.append_document(&holder.id, pending.clone()),
        Err(RepositoryError::Conflict)
    );

    let approved = store
        .verify_document(
            &holder.id,
            &pending.id,
            VerificationStatus::Pending,
            VerificationStatus::Approved,
        )
        .expect("verify");
    assert_eq!(approved.verification_status, VerificationStatus::Approved);

    let again = store
        .verify_document(
            &holder.id,
            &pending.id,
            VerificationStatus::Pending,
            VerificationStatus::Rejected,
        )
        .expect_err("already verified");
    assert!(matches!(
        again,
        RepositoryError::ConcurrentModification {
            entity: "compliance document",
            ..
        }
    ));
}

#[test]
fn events_are_sequenced_in_append_order() {
    let store = InMemoryCoordinationStore::default();
    store
        .append_event(
            "participant",
            now(),
            LedgerEventKind::RequestSubmitted {
                request_id: request().id,
            },
        )
        .expect("append");
    store
        .append_event(
            "admin",
            now(),
            LedgerEventKind::RequestStatusChanged {
                request_id: request().id,
                from: ServiceRequestStatus::Submitted,
                to: ServiceRequestStatus::UnderReview,
            },
        )
        .expect("append");

    let events = store.events().expect("read");
    let sequences: Vec<u64> = events.iter().map(|event| event.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
    assert_eq!(events[1].actor, "admin");

    let json = serde_json::to_value(&events[1]).expect("serialize");
    assert_eq!(json["kind"]["event"], "request_status_changed");
    assert_eq!(json["kind"]["to"], "under_review");
}
