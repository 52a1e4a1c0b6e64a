//! Compliance-aware service assignment and pay calculation.
//!
//! Requests flow through eligibility filtering and match scoring into an assignment ledger;
//! approved timesheets are priced against the SCHADS rate table in force and frozen into
//! invoices. Every status change is a compare-and-set on the repository and lands in an
//! append-only event log.

pub mod access;
pub mod compliance;
pub mod domain;
pub mod eligibility;
pub mod ledger;
pub mod matching;
pub mod memory;
pub mod pay;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use access::{Capability, Role, ROLE_HEADER};
pub use compliance::{
    AlertSeverity, ComplianceAlert, CompliancePolicy, ComplianceStatus, DocumentFinding,
    DocumentViolation, DEFAULT_WARNING_WINDOW_DAYS,
};
pub use domain::{
    Assignment, AssignmentId, AssignmentStatus, CategoryFamily, ComplianceDocument, DocumentId,
    DocumentType, GeoPoint, InvoiceId, ParticipantId, ServiceCategory, ServiceRequest,
    ServiceRequestId, ServiceRequestStatus, TimeWindow, Timesheet, TimesheetId, TimesheetStatus,
    Urgency, VerificationStatus, Worker, WorkerId,
};
pub use eligibility::{EligibilityFilter, EligibilityVerdict, IneligibilityReason};
pub use ledger::{Invoice, LedgerEvent, LedgerEventKind};
pub use matching::{MatchFactor, MatchScorer, MatchWeights, RankedCandidate, ScoreComponent};
pub use memory::{InMemoryCoordinationStore, InMemoryNotifier};
pub use pay::{
    AllowanceKind, AllowanceLine, PayBreakdown, PayCalculator, PayError, PenaltyKind,
    PenaltyLine, PenaltyMultipliers, RateImportError, RateSchedule, RateTable,
    TravelAllowanceMethod,
};
pub use repository::{
    CoordinationRepository, Notification, NotificationError, NotificationPublisher,
    RepositoryError,
};
pub use router::coordination_router;
pub use service::{
    AssignCommand, CandidateSearch, Cancellation, CoordinationConfig, CoordinationError,
    CoordinationService, DocumentUpload, ErrorKind, PayQuote, RequestSubmission,
    TimesheetSubmission, WorkerRegistration,
};
