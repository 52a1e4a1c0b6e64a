use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    AssignmentId, DocumentId, InvoiceId, ParticipantId, ServiceRequestId, ServiceRequestStatus,
    TimesheetId, TimesheetStatus, VerificationStatus, WorkerId,
};
use super::pay::PayBreakdown;

impl ServiceRequestStatus {
    /// Forward-only lifecycle. Assignment may happen straight from intake; cancellation is
    /// reachable from every state before completion.
    pub const fn can_transition_to(self, next: ServiceRequestStatus) -> bool {
        use ServiceRequestStatus::*;

        matches!(
            (self, next),
            (Submitted, UnderReview)
                | (Submitted, Assigned)
                | (UnderReview, Assigned)
                | (Assigned, Confirmed)
                | (Confirmed, Completed)
                | (Submitted, Cancelled)
                | (UnderReview, Cancelled)
                | (Assigned, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// States in which a request may hold an active assignment.
    pub const fn holds_assignment(self) -> bool {
        matches!(self, Self::Assigned | Self::Confirmed | Self::Completed)
    }
}

impl TimesheetStatus {
    /// A timesheet instance is decided once. Resubmission after rejection creates a new instance.
    pub const fn can_transition_to(self, next: TimesheetStatus) -> bool {
        matches!(
            (self, next),
            (TimesheetStatus::Submitted, TimesheetStatus::Approved)
                | (TimesheetStatus::Submitted, TimesheetStatus::Rejected)
        )
    }
}

impl VerificationStatus {
    pub const fn can_transition_to(self, next: VerificationStatus) -> bool {
        matches!(
            (self, next),
            (VerificationStatus::Pending, VerificationStatus::Approved)
                | (VerificationStatus::Pending, VerificationStatus::Rejected)
        )
    }
}

/// Append-only audit record of a ledger change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub sequence: u64,
    pub recorded_at: NaiveDateTime,
    pub actor: String,
    pub kind: LedgerEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEventKind {
    WorkerRegistered {
        worker_id: WorkerId,
    },
    DocumentUploaded {
        worker_id: WorkerId,
        document_id: DocumentId,
    },
    DocumentVerified {
        worker_id: WorkerId,
        document_id: DocumentId,
        status: VerificationStatus,
    },
    RequestSubmitted {
        request_id: ServiceRequestId,
    },
    RequestStatusChanged {
        request_id: ServiceRequestId,
        from: ServiceRequestStatus,
        to: ServiceRequestStatus,
    },
    AssignmentCreated {
        assignment_id: AssignmentId,
        request_id: ServiceRequestId,
        worker_id: WorkerId,
        match_score: f64,
    },
    AssignmentVoided {
        assignment_id: AssignmentId,
        request_id: ServiceRequestId,
    },
    TimesheetSubmitted {
        timesheet_id: TimesheetId,
        assignment_id: AssignmentId,
        supersedes: Option<TimesheetId>,
    },
    TimesheetApproved {
        timesheet_id: TimesheetId,
    },
    TimesheetRejected {
        timesheet_id: TimesheetId,
        reason: String,
    },
    InvoiceIssued {
        invoice_id: InvoiceId,
        timesheet_id: TimesheetId,
        total: Decimal,
    },
}

/// Issued on timesheet approval. The breakdown is frozen here and never recalculated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub timesheet_id: TimesheetId,
    pub assignment_id: AssignmentId,
    pub service_request_id: ServiceRequestId,
    pub participant_id: ParticipantId,
    pub worker_id: WorkerId,
    pub breakdown: PayBreakdown,
    pub issued_at: NaiveDateTime,
}
